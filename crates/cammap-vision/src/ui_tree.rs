use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

use cammap_data::requirements::{normalize_name, CHROME_DENYLIST};
use cammap_data::{BoundingBox, Point};

/// Errors raised while extracting clickable elements from a device UI dump.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid ui dump xml: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("malformed bounds attribute '{0}'")]
    MalformedBounds(String),
}

/// Clickable elements extracted from an accessibility-tree dump, keyed two
/// ways: by derived name for pattern search and by centroid key for
/// reconciliation against image detections.
#[derive(Debug, Clone, Default)]
pub struct ParsedTree {
    pub by_name: BTreeMap<String, BoundingBox>,
    pub by_centroid: HashMap<String, BoundingBox>,
}

impl ParsedTree {
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// First element whose derived name contains the normalized pattern.
    pub fn find(&self, pattern: &str) -> Option<(&str, BoundingBox)> {
        let needle = normalize_name(pattern);
        self.by_name
            .iter()
            .find(|(name, _)| name.contains(&needle))
            .map(|(name, bounds)| (name.as_str(), *bounds))
    }

    /// First element matching any of the given name fragments, in fragment
    /// priority order.
    pub fn find_any(&self, patterns: &[&str]) -> Option<(&str, BoundingBox)> {
        patterns.iter().find_map(|p| self.find(p))
    }
}

/// Walk a uiautomator XML dump and collect the clickable nodes.
///
/// A node's name is the longer of its text label and its accessibility
/// description (ties favor the description), normalized. Nodes matching
/// the known UI-chrome denylist and nodes with an empty derived name are
/// discarded. Malformed bounds abort the whole parse: downstream steps
/// assume well-formed element maps.
pub fn clickable_elements(xml: &str) -> Result<ParsedTree, ParseError> {
    let doc = roxmltree::Document::parse(xml)?;

    let mut tree = ParsedTree::default();
    for node in doc.descendants() {
        if node.attribute("clickable") != Some("true") {
            continue;
        }
        let Some(bounds_attr) = node.attribute("bounds").filter(|b| !b.is_empty()) else {
            continue;
        };
        let bounds = parse_bounds(bounds_attr)?;

        let text = node.attribute("text").unwrap_or_default();
        let description = node.attribute("content-desc").unwrap_or_default();
        let raw = if text.len() > description.len() {
            text
        } else {
            description
        };
        let name = normalize_name(raw);
        if name.is_empty() {
            continue;
        }
        if CHROME_DENYLIST.iter().any(|chrome| name.contains(chrome)) {
            debug!("discarding ui chrome element '{name}'");
            continue;
        }

        tree.by_centroid.insert(bounds.centroid_key(), bounds);
        tree.by_name.insert(name, bounds);
    }

    debug!("ui dump: {} clickable elements", tree.by_name.len());
    Ok(tree)
}

/// Parse a uiautomator bounds attribute, `"[x1,y1][x2,y2]"`.
pub fn parse_bounds(raw: &str) -> Result<BoundingBox, ParseError> {
    let malformed = || ParseError::MalformedBounds(raw.to_string());

    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let (first, second) = inner.split_once("][").ok_or_else(malformed)?;

    let parse_pair = |pair: &str| -> Result<Point, ParseError> {
        let (x, y) = pair.split_once(',').ok_or_else(malformed)?;
        Ok(Point::new(
            x.trim().parse().map_err(|_| malformed())?,
            y.trim().parse().map_err(|_| malformed())?,
        ))
    };

    Ok(BoundingBox::new(parse_pair(first)?, parse_pair(second)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(nodes: &str) -> String {
        format!("<hierarchy rotation=\"0\">{nodes}</hierarchy>")
    }

    #[test]
    fn test_parse_bounds() {
        let b = parse_bounds("[10,20][110,220]").unwrap();
        assert_eq!(b.min, Point::new(10, 20));
        assert_eq!(b.max, Point::new(110, 220));
    }

    #[test]
    fn test_malformed_bounds_is_an_error() {
        assert!(parse_bounds("10,20 110,220").is_err());
        assert!(parse_bounds("[10,20][110]").is_err());
        assert!(parse_bounds("[a,20][110,220]").is_err());
        let xml = dump(r#"<node clickable="true" bounds="[oops]" content-desc="Shutter"/>"#);
        assert!(matches!(
            clickable_elements(&xml),
            Err(ParseError::MalformedBounds(_))
        ));
    }

    #[test]
    fn test_extracts_clickable_nodes_only() {
        let xml = dump(concat!(
            r#"<node clickable="true" bounds="[0,0][100,100]" text="" content-desc="Switch camera"/>"#,
            r#"<node clickable="false" bounds="[0,100][100,200]" text="Preview" content-desc=""/>"#,
            r#"<node clickable="true" bounds="[100,0][200,100]" text="Shutter" content-desc=""/>"#,
        ));
        let tree = clickable_elements(&xml).unwrap();
        assert_eq!(tree.by_name.len(), 2);
        assert!(tree.by_name.contains_key("switch_camera"));
        assert!(tree.by_name.contains_key("shutter"));
        assert_eq!(tree.by_centroid.len(), 2);
        assert!(tree.by_centroid.contains_key("50:50"));
    }

    #[test]
    fn test_name_is_longer_of_text_and_description() {
        let xml = dump(concat!(
            r#"<node clickable="true" bounds="[0,0][10,10]" text="AR" content-desc="Aspect Ratio"/>"#,
            // Tie: description wins.
            r#"<node clickable="true" bounds="[20,0][30,10]" text="abc" content-desc="xyz"/>"#,
        ));
        let tree = clickable_elements(&xml).unwrap();
        assert!(tree.by_name.contains_key("aspect_ratio"));
        assert!(tree.by_name.contains_key("xyz"));
        assert!(!tree.by_name.contains_key("abc"));
    }

    #[test]
    fn test_chrome_and_nameless_nodes_discarded() {
        let xml = dump(concat!(
            r#"<node clickable="true" bounds="[0,0][10,10]" text="" content-desc="Back"/>"#,
            r#"<node clickable="true" bounds="[20,0][30,10]" text="" content-desc="Open gallery"/>"#,
            r#"<node clickable="true" bounds="[40,0][50,10]" text="" content-desc=""/>"#,
            r#"<node clickable="true" bounds="[60,0][70,10]" text="Flash" content-desc=""/>"#,
        ));
        let tree = clickable_elements(&xml).unwrap();
        assert_eq!(tree.by_name.len(), 1);
        assert!(tree.by_name.contains_key("flash"));
    }

    #[test]
    fn test_find_any_respects_pattern_priority() {
        let xml = dump(concat!(
            r#"<node clickable="true" bounds="[0,0][10,10]" content-desc="ratio 16:9" text=""/>"#,
            r#"<node clickable="true" bounds="[20,0][30,10]" content-desc="aspect_ratio_menu" text=""/>"#,
        ));
        let tree = clickable_elements(&xml).unwrap();
        let (name, _) = tree.find_any(&["aspect_ratio", "ratio"]).unwrap();
        assert_eq!(name, "aspect_ratio_menu");
    }
}
