use std::io::Write;

/// 初始化 env_logger：带颜色的 level，单行输出，末尾附 module 和位置
pub fn init_log() {
    env_logger::Builder::new()
        .format(|buf, record| {
            let level_color = match record.level() {
                log::Level::Error => anstyle::AnsiColor::Red,
                log::Level::Warn => anstyle::AnsiColor::Yellow,
                log::Level::Info => anstyle::AnsiColor::Green,
                _ => anstyle::AnsiColor::White,
            };
            let level_style =
                buf.default_level_style(record.level()).fg_color(Some(anstyle::Color::Ansi(level_color)));
            let dim_style = anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(
                128, 128, 128,
            ))));

            writeln!(
                buf,
                "{level_style}{} [{:>5}]{level_style:#} {} {dim_style}({} {}:{}){dim_style:#}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args(),
                record.module_path().unwrap_or(""),
                record.file().unwrap_or("").rsplit('/').next().unwrap_or(""),
                record.line().unwrap_or(0),
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();
}
