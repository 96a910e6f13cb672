/// iperf3 client command measuring throughput to `server` in Mbits/sec
pub fn client_command(server: &str, port: u16, duration_secs: u32) -> String {
    format!("iperf3 -c {} -p {} -t {} -f m", server, port, duration_secs)
}

/// Bits per second for an iperf3 rate unit such as `Mbits/sec`
fn unit_scale(unit: &str) -> Option<f64> {
    let prefix = unit.strip_suffix("bits/sec")?;
    match prefix {
        "" => Some(1.0),
        "K" => Some(1e3),
        "M" => Some(1e6),
        "G" => Some(1e9),
        "T" => Some(1e12),
        _ => None,
    }
}

/// Extract the sender-side throughput from iperf3 text output, in MB/s.
///
/// With several parallel streams the `[SUM]` sender line wins.
pub fn parse_sender_throughput(output: &str) -> Option<f64> {
    let sender_lines: Vec<&str> = output
        .lines()
        .filter(|line| line.split_whitespace().last() == Some("sender"))
        .collect();

    let line = sender_lines
        .iter()
        .find(|line| line.trim_start().starts_with("[SUM]"))
        .or_else(|| sender_lines.last())?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let unit_pos = tokens.iter().position(|t| unit_scale(t).is_some())?;
    if unit_pos == 0 {
        return None;
    }

    let value: f64 = tokens[unit_pos - 1].parse().ok()?;
    let bits_per_sec = value * unit_scale(tokens[unit_pos])?;
    Some(bits_per_sec / 8.0 / 1e6)
}
