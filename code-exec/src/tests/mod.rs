mod fixtures;
mod languages;
mod script;
mod utils;
