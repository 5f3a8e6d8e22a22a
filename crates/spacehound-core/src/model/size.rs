/// Byte-count constants and human-readable formatting.
///
/// All sizes are `u64` bytes internally; floating point only appears at the
/// display boundary (status messages and CLI output).

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

/// Format a byte count using binary units with the short labels users expect.
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KB", b / KIB as f64)
    } else if bytes < GIB {
        format!("{:.1} MB", b / MIB as f64)
    } else if bytes < TIB {
        format!("{:.2} GB", b / GIB as f64)
    } else {
        format!("{:.2} TB", b / TIB as f64)
    }
}

/// Format a count with thousand separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
