use console::style;

pub struct Console;

impl Console {
    const fn get_width() -> usize {
        40
    }

    pub fn section(title: &str) {
        let width = Self::get_width();
        let border = "─".repeat(width);
        println!("{}", style(&border).magenta());
        println!("{}", style(format!("{title:^width$}")).magenta().bold());
        println!("{}", style(&border).magenta());
    }

    pub fn title(text: &str) {
        println!("{}", style(text).magenta().bold());
    }

    pub fn info(label: &str, value: &str) {
        println!("    {}: {}", style(label).dim(), style(value).white());
    }

    pub fn line(text: &str) {
        println!("{text}");
    }

    pub fn item(text: &str) {
        println!("    {text}");
    }

    pub fn warning(text: &str) {
        eprintln!("{} {}", style("⚠").yellow().bold(), style(text).yellow());
    }

    pub fn error(text: &str) {
        eprintln!("{} {}", style("✗").red().bold(), style(text).red());
    }
}
