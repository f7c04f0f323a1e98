//! Tracing subscriber setup.

use std::fs::File;

use time::{format_description, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Install the global tracing subscriber.
///
/// With `to_file` everything down to TRACE goes to a timestamped log file in
/// the working directory; otherwise INFO and up go to stderr.
///
/// Will panic on error
pub fn init_logger(to_file: bool) {
    let (writer, max_level) = if to_file {
        let file = File::create(get_log_file_name()).unwrap();
        (BoxMakeWriter::new(file), Level::TRACE)
    } else {
        (BoxMakeWriter::new(std::io::stderr), Level::INFO)
    };

    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_ansi(!to_file)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).expect("Could not set global default tracing subscriber. Consider disabling logs if you are already setting a subscriber.");
}

fn get_log_file_name() -> String {
    let format = format_description::parse("[year]-[month]-[day]_[hour]:[minute]:[second]_log.txt")
        .unwrap();
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).unwrap()
}
