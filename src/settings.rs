// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Build and run settings of one commit.
///
/// A zero or empty field means "unset" and is filled in from the base
/// settings by [`Settings::inherit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Number of timed runs
    #[serde(default)]
    pub runs: usize,
    /// Value substituted for the depth placeholder of the run command
    #[serde(default)]
    pub depth: i64,
    /// Shell command building the checkout
    #[serde(default)]
    pub build_cmd: String,
    /// Shell command template executed for every sample
    #[serde(default)]
    pub run_cmd: String,
}

impl Settings {
    /// Fill every unset field from `base`.
    pub fn inherit(mut self, base: &Settings) -> Settings {
        if self.runs == 0 {
            self.runs = base.runs;
        }
        if self.depth == 0 {
            self.depth = base.depth;
        }
        if self.build_cmd.is_empty() {
            self.build_cmd = base.build_cmd.clone();
        }
        if self.run_cmd.is_empty() {
            self.run_cmd = base.run_cmd.clone();
        }
        self
    }

    /// Check that merged settings can actually be built and benchmarked.
    pub fn validate(&self, label: &str) -> Result<()> {
        let missing = if self.runs == 0 {
            "runs"
        } else if self.build_cmd.trim().is_empty() {
            "buildCmd"
        } else if self.run_cmd.trim().is_empty() {
            "runCmd"
        } else {
            return Ok(());
        };
        Err(Error::Config(format!(
            "commit `{}` has no `{}`, neither in its settings nor in baseSettings",
            label, missing
        )))
    }

    pub fn run_template(&self) -> RunTemplate {
        RunTemplate::parse(&self.run_cmd)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Depth,
}

/// Run command with the depth parameter as an explicit slot.
///
/// `%p` marks the slot and `%%p` stands for a literal `%p`. Anything else,
/// other `%` sequences included, is copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTemplate {
    segments: Vec<Segment>,
}

impl RunTemplate {
    pub const DEPTH: &'static str = "%p";
    const ESCAPED_DEPTH: &'static str = "%%p";

    pub fn parse(template: &str) -> RunTemplate {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        while let Some(c) = rest.chars().next() {
            if rest.starts_with(Self::ESCAPED_DEPTH) {
                literal.push_str(Self::DEPTH);
                rest = &rest[Self::ESCAPED_DEPTH.len()..];
            } else if rest.starts_with(Self::DEPTH) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Depth);
                rest = &rest[Self::DEPTH.len()..];
            } else {
                literal.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        RunTemplate { segments }
    }

    pub fn has_depth(&self) -> bool {
        self.segments.contains(&Segment::Depth)
    }

    pub fn render(&self, depth: i64) -> String {
        let depth = depth.to_string();
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Depth => depth.as_str(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings {
            runs: 10,
            depth: 6,
            build_cmd: "make".into(),
            run_cmd: "./bin/perft %p".into(),
        }
    }

    #[test]
    fn inherit_fills_only_unset_fields() {
        let own = Settings {
            runs: 3,
            depth: 0,
            build_cmd: String::new(),
            run_cmd: "./bin/other %p".into(),
        };
        let merged = own.inherit(&base());
        assert_eq!(merged.runs, 3);
        assert_eq!(merged.depth, 6);
        assert_eq!(merged.build_cmd, "make");
        assert_eq!(merged.run_cmd, "./bin/other %p");
    }

    #[test]
    fn inherit_from_empty_commit_settings_copies_base() {
        assert_eq!(Settings::default().inherit(&base()), base());
    }

    #[test]
    fn validate_rejects_zero_runs() {
        let settings = Settings {
            runs: 0,
            ..base()
        };
        let err = settings.validate("feature").unwrap_err();
        assert!(err.to_string().contains("`runs`"), "{}", err);
        assert!(err.to_string().contains("feature"), "{}", err);
    }

    #[test]
    fn validate_rejects_blank_commands() {
        let settings = Settings {
            build_cmd: "  ".into(),
            ..base()
        };
        assert!(settings.validate("x").is_err());
        assert!(base().validate("x").is_ok());
    }

    #[test]
    fn template_substitutes_every_depth_slot() {
        let template = RunTemplate::parse("./bin/perft %p && echo depth=%p");
        assert!(template.has_depth());
        assert_eq!(template.render(4), "./bin/perft 4 && echo depth=4");
        assert_eq!(template.render(-2), "./bin/perft -2 && echo depth=-2");
    }

    #[test]
    fn template_keeps_other_percent_sequences() {
        let template = RunTemplate::parse("date +%s; printf '%%p %d' 1; echo %");
        assert!(!template.has_depth());
        assert_eq!(template.render(9), "date +%s; printf '%p %d' 1; echo %");
    }

    #[test]
    fn template_without_slot_is_verbatim() {
        let template = RunTemplate::parse("sleep 0.01 # ünïcode");
        assert_eq!(template.render(1), "sleep 0.01 # ünïcode");
    }

    #[test]
    fn settings_serialize_in_camel_case() {
        let json = serde_json::to_string(&base()).unwrap();
        assert_eq!(
            json,
            r#"{"runs":10,"depth":6,"buildCmd":"make","runCmd":"./bin/perft %p"}"#
        );
    }
}
