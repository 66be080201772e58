//! Line-oriented terminal output shared by the `shadowlink` commands.
//!
//! Status lines carry a bracketed tag (`[ok]`, `[warn]`) so they stay
//! readable when `NO_COLOR` strips the styling.

const LABEL_WIDTH: usize = 14;

fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn paint(ansi: &str, text: &str) -> String {
    if color_enabled() {
        format!("\x1b[{ansi}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

/// Aligned `label: value` line, without styling.
fn field_line(label: &str, value: &str) -> String {
    format!("  {:<width$} {value}", format!("{label}:"), width = LABEL_WIDTH)
}

/// Final status of a command that did what was asked.
pub fn print_ok(message: &str) {
    println!("{} {message}", paint("32", "[ok]"));
}

/// Something the operator should look at; goes to stderr.
pub fn print_warning(message: &str) {
    eprintln!("{} {message}", paint("33", "[warn]"));
}

/// One field of a report.
pub fn print_field(label: &str, value: &str) {
    println!("{}", field_line(label, value));
}

/// Any serializable value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> crate::error::CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
