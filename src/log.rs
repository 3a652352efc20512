pub enum LogCategory {
    Info,
    Warning,
    Error,
    Pass,
    Fail,
}

pub fn log(category: LogCategory, text: &str, file: &str, line: u32) {
    use chrono::prelude::*;
    use colored::*;

    let cat = match category {
        LogCategory::Info => "[INF]".white().on_black(),
        LogCategory::Warning => "[WRN]".yellow().on_black(),
        LogCategory::Error => "[ERR]".red().on_black(),
        LogCategory::Pass => "[PASS]".green().on_black(),
        LogCategory::Fail => "[FAIL]".red().bold().on_black(),
    };

    #[cfg(debug_assertions)]
    println!("{} {} {} [{}:{}]", Local::now().format("%T%.3f"), cat, text, file, line);

    #[cfg(not(debug_assertions))]
    {
        let _ = (file, line);
        println!("{} {} {}", Local::now().format("%T%.3f"), cat, text);
    }
}

/// Logs with the calling file and line attached.
macro_rules! log {
    ($category:ident, $($arg:tt)+) => {
        $crate::log::log(
            $crate::log::LogCategory::$category,
            &format!($($arg)+),
            file!(),
            line!(),
        )
    };
}
