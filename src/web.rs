use crate::run::run;
use crate::treewalk::Environment;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn run_standard(code: &str) -> String {
    let env = Environment::standard().extend();
    match run(code, &env) {
        Ok(v) => v.to_string(),
        Err(err) => err.to_string(),
    }
}
