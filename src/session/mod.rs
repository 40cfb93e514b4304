pub mod controller;
pub mod core;
mod run_effect;

#[cfg(test)]
mod tests;
