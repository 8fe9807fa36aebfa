mod config_loading;
mod mode_arbiter;
mod split_properties;
mod test_utils;
