use geo::Rect;

use crate::config::TileSizes;

/// The three feature categories acquired per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Roads,
    Buildings,
    Places,
}

impl QueryKind {
    /// Stage label used in diagnostics and artifact names.
    pub fn label(&self) -> &'static str {
        match self {
            QueryKind::Roads => "roads",
            QueryKind::Buildings => "buildings",
            QueryKind::Places => "places",
        }
    }

    /// Maximum tile edge for this category's uniform tiling fallback.
    pub(crate) fn tile_size(&self, sizes: &TileSizes) -> f64 {
        match self {
            QueryKind::Roads => sizes.roads,
            QueryKind::Buildings => sizes.buildings,
            QueryKind::Places => sizes.places,
        }
    }

    /// Render the interpreter query for this category over `bbox`.
    pub(crate) fn overpass_ql(&self, bbox: &Rect<f64>) -> String {
        let b = render_bbox(bbox);
        match self {
            QueryKind::Roads => format!(
                "[out:json][timeout:180];\n(\n  \
                 way[\"highway\"=\"motorway\"]({b});\n  \
                 way[\"highway\"=\"trunk\"]({b});\n  \
                 way[\"highway\"=\"primary\"]({b});\n  \
                 way[\"highway\"=\"secondary\"]({b});\n  \
                 way[\"highway\"=\"tertiary\"]({b});\n  \
                 way[\"highway\"=\"residential\"]({b});\n);\nout geom;"
            ),
            QueryKind::Buildings => format!(
                "[out:json][timeout:180];\n(\n  way[\"building\"]({b});\n);\nout geom;"
            ),
            QueryKind::Places => format!(
                "[out:json][timeout:180];\n(\n  \
                 nwr[\"place\"=\"neighbourhood\"]({b});\n  \
                 nwr[\"place\"=\"quarter\"]({b});\n  \
                 nwr[\"place\"=\"suburb\"]({b});\n  \
                 nwr[\"place\"=\"hamlet\"]({b});\n  \
                 nwr[\"place\"=\"village\"]({b});\n  \
                 nwr[\"aeroway\"=\"terminal\"]({b});\n);\nout geom;"
            ),
        }
    }
}

/// Interpreter bbox filters are `south,west,north,east`.
fn render_bbox(bbox: &Rect<f64>) -> String {
    format!("{},{},{},{}", bbox.min().y, bbox.min().x, bbox.max().y, bbox.max().x)
}
