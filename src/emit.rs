//! Text artifacts derived from the merged anchor map.
//!
//! Every emitter walks the map in key order, which is also the order the
//! store file is written in, so output is stable across runs.

use crate::geometry::{CssParams, PortraitSize, crop_rect, css_offset};
use crate::naming::NamingRule;
use crate::record::{AnchorMap, AnchorRecord, SubjectKey};

/// Class-name fragment for a subject: `(`, `)` and `,` become `_`.
pub fn css_selector(key: &SubjectKey) -> String {
    key.as_str().replace(['(', ')', ','], "_")
}

/// One `.{prefix}{selector} img { ... }` rule per subject.
pub fn css_rules(anchors: &AnchorMap, params: &CssParams, prefix: &str) -> Vec<String> {
    anchors
        .iter()
        .map(|(key, record)| {
            let offset = css_offset(record, params);
            format!(
                ".{prefix}{} img {{ margin-left: {}; margin-top: {} }}",
                css_selector(key),
                negative_px(offset.margin_left),
                negative_px(offset.margin_top)
            )
        })
        .collect()
}

fn negative_px(value: f64) -> String {
    if value == 0.0 {
        "0px".to_string()
    } else {
        format!("-{value}px")
    }
}

/// Settings for [`crop_commands`].
#[derive(Debug, Clone)]
pub struct CropCommandSpec<'a> {
    pub program: &'a str,
    pub portrait: PortraitSize,
    pub naming: &'a NamingRule,
    pub extension: &'a str,
}

/// One `{program} -crop WxH±X±Y "{glob}"` command per subject.
pub fn crop_commands(anchors: &AnchorMap, command: &CropCommandSpec<'_>) -> Vec<String> {
    anchors
        .iter()
        .map(|(key, record)| {
            format!(
                "{} -crop {} \"{}\"",
                command.program,
                crop_rect(record, command.portrait),
                command.naming.variant_glob(key, command.extension)
            )
        })
        .collect()
}

/// Wikitext switch cases for subjects whose height is not `reference_height`.
pub fn height_switch(anchors: &AnchorMap, reference_height: u32) -> Vec<String> {
    anchors
        .iter()
        .filter(|(_, record)| record.height() != reference_height)
        .map(|(key, record)| format!("|{}={}", key.as_str().replace('_', " "), record.height()))
        .collect()
}

/// Four `{{#switch:{{{2|}}}` blocks, one per stored field in positional order.
///
/// Centers print as the shortest plain decimal: `1` and `0` for the bounds,
/// never a trailing `.0` or exponent notation.
pub fn field_switches(anchors: &AnchorMap) -> Vec<String> {
    let fields: [fn(&AnchorRecord) -> String; 4] = [
        |r| r.width().to_string(),
        |r| r.height().to_string(),
        |r| r.center_x().to_string(),
        |r| r.center_y().to_string(),
    ];

    let mut lines = Vec::with_capacity(fields.len() * (anchors.len() + 2));
    for field in fields {
        lines.push("{{#switch:{{{2|}}}".to_string());
        lines.extend(
            anchors
                .iter()
                .map(|(key, record)| format!("|{key}={}", field(record))),
        );
        lines.push("}}".to_string());
    }
    lines
}
