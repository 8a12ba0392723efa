//! Google Fonts CSS API v2 URLs.

use std::cmp::Ordering;

use super::options::{GoogleFontCatalog, GoogleFontOptions};
use crate::error::LoaderError;
use crate::loader::format_available_values;

/// Weight range requested for `variable` weights of families the catalog
/// does not describe.
pub const DEFAULT_VARIABLE_WEIGHT_RANGE: &str = "100..900";

/// Axis values to request for one family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontAxes {
    pub wght: Option<Vec<String>>,
    pub ital: Option<Vec<String>>,
    pub variable_axes: Option<Vec<(String, String)>>,
}

/// Work out the axes to request from the validated call.
pub fn get_font_axes(
    options: &GoogleFontOptions,
    catalog: &GoogleFontCatalog,
) -> Result<FontAxes, LoaderError> {
    let has_italic = options.styles.iter().any(|s| s == "italic");
    let has_normal = options.styles.iter().any(|s| s == "normal");
    let ital = has_italic.then(|| {
        let mut values = Vec::new();
        if has_normal {
            values.push("0".to_string());
        }
        values.push("1".to_string());
        values
    });

    if options.weights.first().map(String::as_str) != Some("variable") {
        return Ok(FontAxes {
            wght: Some(options.weights.clone()),
            ital,
            variable_axes: None,
        });
    }

    let family = &options.font_family;
    let all_axes = catalog
        .get(family)
        .map(|data| data.axes.clone())
        .unwrap_or_default();

    if let Some(selected) = &options.selected_variable_axes {
        let definable: Vec<&str> = all_axes
            .iter()
            .map(|axis| axis.tag.as_str())
            .filter(|tag| *tag != "wght")
            .collect();
        if definable.is_empty() {
            return Err(LoaderError::invalid_arguments(format!(
                "Font `{}` has no definable `axes`",
                family
            )));
        }
        for key in selected {
            if !definable.contains(&key.as_str()) {
                return Err(LoaderError::invalid_arguments(format!(
                    "Invalid axes value `{}` for font `{}`.\nAvailable axes: {}",
                    key,
                    family,
                    format_available_values(&definable)
                )));
            }
        }
    }

    let mut weight_axis = None;
    let mut variable_axes: Option<Vec<(String, String)>> = None;
    for axis in &all_axes {
        if axis.tag == "wght" {
            weight_axis = Some(axis.range());
        } else if options
            .selected_variable_axes
            .as_ref()
            .is_some_and(|selected| selected.contains(&axis.tag))
        {
            variable_axes
                .get_or_insert_with(Vec::new)
                .push((axis.tag.clone(), axis.range()));
        }
    }
    if all_axes.is_empty() {
        weight_axis = Some(DEFAULT_VARIABLE_WEIGHT_RANGE.to_string());
    }

    Ok(FontAxes {
        wght: weight_axis.map(|range| vec![range]),
        ital,
        variable_axes,
    })
}

/// Lowercase tags first, then alphabetical.
fn compare_axis_tags(a: &str, b: &str) -> Ordering {
    let a_lower = a.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let b_lower = b.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    match (a_lower, b_lower) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Leading integer of a value such as `400` or `100..900`.
fn leading_int(value: &str) -> i64 {
    let digits: String = value
        .trim()
        .chars()
        .enumerate()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
        .map(|(_, c)| c)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Order of variant tuples Google requires: by the first value, then the
/// second when both are `ital,wght` pairs.
pub fn sort_fonts_variant_values(a: &str, b: &str) -> Ordering {
    if let (Some((a_prefix, a_suffix)), Some((b_prefix, b_suffix))) =
        (a.split_once(','), b.split_once(','))
    {
        if a_prefix == b_prefix {
            return leading_int(a_suffix).cmp(&leading_int(b_suffix));
        }
        return leading_int(a_prefix).cmp(&leading_int(b_prefix));
    }
    leading_int(a).cmp(&leading_int(b))
}

/// Build the stylesheet URL for a family.
pub fn get_google_fonts_url(font_family: &str, axes: &FontAxes, display: &str) -> String {
    let extra = axes.variable_axes.clone().unwrap_or_default();
    let mut variants: Vec<Vec<(String, String)>> = Vec::new();

    if let Some(wght) = &axes.wght {
        for weight in wght {
            match &axes.ital {
                None => {
                    let mut variant = vec![("wght".to_string(), weight.clone())];
                    variant.extend(extra.iter().cloned());
                    variants.push(variant);
                }
                Some(ital) => {
                    for italic in ital {
                        let mut variant = vec![
                            ("ital".to_string(), italic.clone()),
                            ("wght".to_string(), weight.clone()),
                        ];
                        variant.extend(extra.iter().cloned());
                        variants.push(variant);
                    }
                }
            }
        }
    } else if !extra.is_empty() {
        variants.push(extra.clone());
    }

    if axes.variable_axes.is_some() {
        for variant in &mut variants {
            variant.sort_by(|(a, _), (b, _)| compare_axis_tags(a, b));
        }
    }

    let mut url = format!(
        "https://fonts.googleapis.com/css2?family={}",
        font_family.replace(' ', "+")
    );

    if let Some(first) = variants.first() {
        let keys = first
            .iter()
            .map(|(key, _)| key.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let mut values: Vec<String> = variants
            .iter()
            .map(|variant| {
                variant
                    .iter()
                    .map(|(_, value)| value.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        values.sort_by(|a, b| sort_fonts_variant_values(a, b));
        url.push_str(&format!(":{}@{}", keys, values.join(";")));
    }

    url.push_str(&format!("&display={}", display));
    url
}
