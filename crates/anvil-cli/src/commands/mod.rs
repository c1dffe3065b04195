pub mod assemble;
pub mod run;
