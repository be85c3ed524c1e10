mod parse;
mod toml;

pub use {
  parse::{build_settings, parse_opts, Mode},
  toml::ConfigToml,
};
