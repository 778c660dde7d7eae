use serde_derive::{Deserialize, Serialize};

use crate::treemap::Treemap;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
enum NodeKind {
    Value(u64),
    Children(Vec<Node>),
}

/// d3 `hierarchy` input: `{ name, children }` for the root, `{ name, value,
/// percentage }` for leaves.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Node {
    name: String,
    #[serde(flatten)]
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percentage: Option<String>,
}

/// An empty treemap exports a root without children.
pub fn export(treemap: Option<&Treemap>) -> Node {
    let children = treemap
        .map(|treemap| {
            treemap
                .leaves
                .iter()
                .map(|leaf| Node {
                    name: leaf.name.clone(),
                    kind: NodeKind::Value(leaf.value),
                    percentage: Some(leaf.percentage.clone()),
                })
                .collect()
        })
        .unwrap_or_default();

    Node {
        name: "root".to_string(),
        kind: NodeKind::Children(children),
        percentage: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::latest_by_country;
    use crate::record::{record, Metric};
    use crate::treemap;

    #[test]
    fn test_representation() {
        let snapshot = latest_by_country(&[
            record("a", 25, "2024-01-01"),
            record("b", 75, "2024-01-01"),
            record("c", 0, "2024-01-01"),
        ]);
        let treemap = treemap::build(&snapshot, Metric::Confirmed);
        let structural = export(treemap.as_ref());

        let string: Node = serde_json::from_str(
            r#"
            {
                "name": "root",
                "children": [
                    {
                        "name": "b",
                        "value": 75,
                        "percentage": "75.0"
                    },
                    {
                        "name": "a",
                        "value": 25,
                        "percentage": "25.0"
                    }
                ]
            }
            "#,
        )
        .unwrap();

        assert_eq!(structural, string);
    }

    #[test]
    fn empty_treemap_has_no_children() {
        assert_eq!(
            serde_json::to_string(&export(None)).unwrap(),
            r#"{"name":"root","children":[]}"#
        );
    }
}
