mod export;
mod food;
mod helpers;
mod import;
mod intake;
mod library;
mod log;
mod stats;

pub(crate) use export::cmd_export;
pub(crate) use food::{cmd_food_add, cmd_food_delete, cmd_food_list, cmd_food_show, cmd_food_update};
pub(crate) use import::{cmd_import_foods, cmd_import_log};
pub(crate) use intake::{cmd_breakdown, cmd_intake};
pub(crate) use library::{cmd_library_add, cmd_library_delete, cmd_library_list};
pub(crate) use log::{cmd_log_add, cmd_log_delete, cmd_log_list, cmd_log_update};
pub(crate) use stats::cmd_stats;
