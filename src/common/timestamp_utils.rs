use chrono::{DateTime, Local};

// Current local time rendered with a strftime format from the config
pub fn current_local_timestamp_str(format_str: &str) -> String {
    let now: DateTime<Local> = Local::now();
    now.format(format_str).to_string()
}
