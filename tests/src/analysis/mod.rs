mod boundary;
mod selectors;
