//! Model output cleanup
//!
//! Small models leak prompt scaffolding and repeat themselves. Responses pass
//! through here before reaching the dashboard: thinking blocks and chat
//! template tokens are stripped, then consecutive duplicate lines collapsed.

use std::sync::OnceLock;

use regex::Regex;

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<think>.*?</think>").unwrap_or_else(|_| unreachable!())
    })
}

fn artifact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Chat-template tokens and role labels echoed back by the model.
        Regex::new(r"<\|im_(?:start|end)\|>|<\|endoftext\|>|</?s>|\[/?INST\]|(?m:^(?:assistant|Assistant):\s*)")
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Strip prompt artifacts and deduplicate a model response.
pub fn clean_response(raw: &str) -> String {
    let text = think_block_re().replace_all(raw, "");
    let text = artifact_re().replace_all(&text, "");

    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        // Drop a line that exactly repeats the previous non-empty line.
        let repeated = lines
            .iter()
            .rev()
            .find(|l| !l.is_empty())
            .is_some_and(|prev| !line.is_empty() && *prev == line);
        if !repeated {
            lines.push(line);
        }
    }

    // Collapse runs of blank lines left behind by stripping.
    let mut out = String::new();
    let mut blank_run = 0;
    for line in lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_blocks_are_removed() {
        let raw = "<think>\nLet me analyze the data.\n</think>\nTemperature is stable.";
        assert_eq!(clean_response(raw), "Temperature is stable.");
    }

    #[test]
    fn chat_template_tokens_are_removed() {
        let raw = "Temperature is rising.<|im_end|>";
        assert_eq!(clean_response(raw), "Temperature is rising.");
    }

    #[test]
    fn assistant_label_is_removed() {
        let raw = "Assistant: All readings look normal.";
        assert_eq!(clean_response(raw), "All readings look normal.");
    }

    #[test]
    fn assistant_label_on_a_later_line_is_removed() {
        let raw = "Temperatures look fine.\nassistant: Humidity is also in range.";
        assert_eq!(
            clean_response(raw),
            "Temperatures look fine.\nHumidity is also in range."
        );
    }

    #[test]
    fn repeated_lines_collapse() {
        let raw = "Check the sensor.\nCheck the sensor.\nCheck the sensor.\nAll else is fine.";
        assert_eq!(clean_response(raw), "Check the sensor.\nAll else is fine.");
    }

    #[test]
    fn distinct_lines_survive() {
        let raw = "Line one.\nLine two.\nLine one.";
        // Non-consecutive repeats are legitimate prose, keep them.
        assert_eq!(clean_response(raw), "Line one.\nLine two.\nLine one.");
    }

    #[test]
    fn blank_runs_collapse() {
        let raw = "First.\n\n\n\nSecond.";
        assert_eq!(clean_response(raw), "First.\n\nSecond.");
    }

    #[test]
    fn clean_text_passes_through() {
        let raw = "The average temperature was 22.5C with no anomalies.";
        assert_eq!(clean_response(raw), raw);
    }
}
