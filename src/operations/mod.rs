pub mod plugin_list_op;
pub mod raw_inspect_op;
pub mod station_op;
