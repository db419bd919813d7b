//! Sequential newline-delimited JSON loop: one request line in, one
//! envelope line out, fully served before the next line is read. EOF
//! terminates cleanly.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::dispatch;
use crate::ServerState;

pub fn serve<R: BufRead, W: Write>(
    state: &mut ServerState,
    reader: R,
    mut writer: W,
) -> Result<()> {
    for line in reader.lines() {
        let line = line.context("failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = dispatch::handle_line(state, &line);
        let rendered =
            serde_json::to_string(&envelope).context("failed to serialize response envelope")?;
        writer.write_all(rendered.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_effective_config, CliOverrides};
    use tempfile::TempDir;

    #[test]
    fn serves_one_envelope_per_line_and_survives_garbage() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "# fixture\n").unwrap();
        let config = load_effective_config(dir.path(), &CliOverrides::default()).unwrap();
        let mut state = ServerState::new(config).unwrap();

        let input = concat!(
            "{\"id\": 1, \"method\": \"repo.status\", \"params\": {}}\n",
            "this is not json\n",
            "{\"id\": 2, \"method\": \"repo.refresh_index\", \"params\": {\"force\": true}}\n",
        );
        let mut output: Vec<u8> = Vec::new();
        serve(&mut state, input.as_bytes(), &mut output).unwrap();

        let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().trim().lines().collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["request_id"], 1);
        assert_eq!(first["ok"], true);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["request_id"], serde_json::Value::Null);
        assert_eq!(second["error"]["code"], "INVALID_PARAMS");

        let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(third["ok"], true);
        assert_eq!(third["result"]["added"], 1);
    }
}
