mod cfg_ir;
mod decoder;
