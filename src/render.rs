use crate::scale::{GREENS_8, PointScale, QuantizeScale, extent};
use crate::types::{CountyShape, EducationIndex};
use anyhow::{Result, anyhow};
use geo::bounding_rect::BoundingRect;
use geo::{Coord, LineString, MultiPolygon, Rect};
use rayon::prelude::*;
use std::fmt::Write;

// Fixed visual contract
const WIDTH: f64 = 1800.0;
const HEIGHT: f64 = 1300.0;
const PAD_TOP: f64 = -100.0;
const PAD_BOTTOM: f64 = 50.0;
const PAD_LEFT: f64 = 100.0;
const PAD_RIGHT: f64 = 100.0;

const LEGEND_RANGE: (f64, f64) = (0.0, 500.0);
const LEGEND_TRANSLATE_X: f64 = 1000.0;
const LEGEND_AXIS_Y: f64 = 100.0;
const LEGEND_SWATCH_Y: f64 = 50.0;
const LEGEND_SWATCH_HEIGHT: f64 = 50.0;

const NO_DATA_FILL: &str = "#cccccc";

const TITLE: &str = "United States Educational Attainment";
const DESCRIPTION: &str =
    "Percentage of adults age 25 and older with a bachelor's degree or higher (2010-2014)";

/// Output of a render: the full page plus the count of shapes that had no
/// matching education record (rendered in the no-data style).
pub struct RenderedPage {
    pub html: String,
    pub unmatched: usize,
}

/// Identity fit-extent projection: one uniform scale and translation that
/// centers the dataset bounds inside a padded screen region. Deterministic
/// for a given input geometry.
#[derive(Debug, Clone, Copy)]
struct Projection {
    scale: f64,
    tx: f64,
    ty: f64,
}

impl Projection {
    fn fit_extent(min: (f64, f64), max: (f64, f64), bounds: Rect<f64>) -> Self {
        let w = max.0 - min.0;
        let h = max.1 - min.1;
        let bw = bounds.width();
        let bh = bounds.height();
        let scale = match (bw > 0.0, bh > 0.0) {
            (true, true) => (w / bw).min(h / bh),
            (true, false) => w / bw,
            (false, true) => h / bh,
            _ => 1.0,
        };
        let tx = (min.0 + max.0) / 2.0 - scale * (bounds.min().x + bounds.max().x) / 2.0;
        let ty = (min.1 + max.1) / 2.0 - scale * (bounds.min().y + bounds.max().y) / 2.0;
        Self { scale, tx, ty }
    }

    fn apply(&self, c: Coord<f64>) -> (f64, f64) {
        (self.scale * c.x + self.tx, self.scale * c.y + self.ty)
    }
}

/// Render the whole page from the two datasets. Pure: no ambient state is
/// touched, and rendering twice over the same inputs yields identical
/// output with exactly one title and one legend.
pub fn render_page(shapes: &[CountyShape], education: &EducationIndex) -> Result<RenderedPage> {
    // One shared scale, derived from the full dataset before any shape is
    // colored.
    let (min, max) = extent(education.values().map(|r| r.bachelors_or_higher))?;
    let color_scale = QuantizeScale::new(min, max, &GREENS_8);

    let bounds = dataset_bounds(shapes)?;
    let projection = Projection::fit_extent(
        (PAD_LEFT, PAD_TOP),
        (WIDTH - PAD_RIGHT, HEIGHT - PAD_BOTTOM),
        bounds,
    );

    let counties: Vec<String> = shapes
        .par_iter()
        .map(|shape| county_markup(shape, education, &color_scale, &projection))
        .collect();
    let unmatched = shapes
        .iter()
        .filter(|shape| !education.contains_key(&shape.fips))
        .count();

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    writeln!(html, "<title>{}</title>", TITLE)?;
    html.push_str("<style>\n");
    html.push_str(include_str!("../assets/style.css"));
    html.push_str("</style>\n</head>\n<body>\n");
    writeln!(html, "<h1 id=\"title\">{}</h1>", TITLE)?;
    writeln!(
        html,
        "<p id=\"description\" class=\"description\">{}</p>",
        escape(DESCRIPTION)
    )?;
    writeln!(
        html,
        "<svg width=\"{}\" height=\"{}\">",
        WIDTH as u32, HEIGHT as u32
    )?;
    html.push_str(&legend_markup(&color_scale)?);
    html.push_str("<g>");
    for county in &counties {
        html.push_str(county);
    }
    html.push_str("</g>\n</svg>\n<script>\n");
    html.push_str(include_str!("../assets/tooltip.js"));
    html.push_str("</script>\n</body>\n</html>\n");

    Ok(RenderedPage { html, unmatched })
}

fn dataset_bounds(shapes: &[CountyShape]) -> Result<Rect<f64>> {
    let mut bounds: Option<Rect<f64>> = None;
    for shape in shapes {
        if let Some(r) = shape.geometry.bounding_rect() {
            bounds = Some(match bounds {
                None => r,
                Some(b) => Rect::new(
                    Coord {
                        x: b.min().x.min(r.min().x),
                        y: b.min().y.min(r.min().y),
                    },
                    Coord {
                        x: b.max().x.max(r.max().x),
                        y: b.max().y.max(r.max().y),
                    },
                ),
            });
        }
    }
    bounds.ok_or_else(|| anyhow!("No county geometry to fit"))
}

fn county_markup(
    shape: &CountyShape,
    education: &EducationIndex,
    color_scale: &QuantizeScale,
    projection: &Projection,
) -> String {
    let d = path_data(&shape.geometry, projection);
    match education.get(&shape.fips) {
        Some(record) => format!(
            r#"<path class="county" d="{d}" data-fips="{fips}" data-education="{edu}" data-county-name="{name}" data-state-name="{state}" fill="{fill}"/>"#,
            fips = shape.fips,
            edu = record.bachelors_or_higher,
            name = escape(&record.area_name),
            state = escape(&record.state),
            fill = color_scale.color(record.bachelors_or_higher),
        ),
        // Explicit no-match policy: sentinel style, no statistics
        // attributes. Never a colored, correctly-labeled mark.
        None => format!(
            r#"<path class="county county--no-data" d="{d}" data-fips="{fips}" fill="{fill}"/>"#,
            fips = shape.fips,
            fill = NO_DATA_FILL,
        ),
    }
}

fn path_data(geometry: &MultiPolygon<f64>, projection: &Projection) -> String {
    let mut d = String::new();
    for polygon in &geometry.0 {
        ring_data(&mut d, polygon.exterior(), projection);
        for interior in polygon.interiors() {
            ring_data(&mut d, interior, projection);
        }
    }
    d
}

fn ring_data(d: &mut String, ring: &LineString<f64>, projection: &Projection) {
    let coords = &ring.0;
    // the closing point duplicates the first; Z closes the subpath
    let n = if coords.len() > 1 && coords.first() == coords.last() {
        coords.len() - 1
    } else {
        coords.len()
    };
    for (i, c) in coords[..n].iter().enumerate() {
        let (x, y) = projection.apply(*c);
        let command = if i == 0 { 'M' } else { 'L' };
        let _ = write!(d, "{}{:.2},{:.2}", command, x, y);
    }
    d.push('Z');
}

fn legend_markup(color_scale: &QuantizeScale) -> Result<String> {
    let points = color_scale.legend_points();
    let positions = PointScale::new(points.len(), LEGEND_RANGE, 1.0);

    let mut g = String::new();
    g.push_str(r#"<g id="legend" class="axis">"#);

    // One swatch per threshold interval, skipping the interval that ends
    // at the domain max: bucket count minus one.
    for (i, value) in points
        .iter()
        .take(color_scale.bucket_count() - 1)
        .enumerate()
    {
        write!(
            g,
            r#"<rect x="{x:.1}" y="{y}" width="{w:.1}" height="{h}" transform="translate({tx}, 0)" fill="{fill}"/>"#,
            x = positions.position(i),
            y = LEGEND_SWATCH_Y,
            w = positions.step(),
            h = LEGEND_SWATCH_HEIGHT,
            tx = LEGEND_TRANSLATE_X,
            fill = color_scale.color(*value),
        )?;
    }

    write!(
        g,
        r#"<g id="legend-axis" transform="translate({}, {})">"#,
        LEGEND_TRANSLATE_X, LEGEND_AXIS_Y
    )?;
    write!(
        g,
        r#"<path class="domain" stroke="currentColor" fill="none" d="M{:.1},0H{:.1}"/>"#,
        positions.position(0),
        positions.position(points.len() - 1),
    )?;
    for (i, value) in points.iter().enumerate() {
        write!(
            g,
            concat!(
                r#"<g class="tick" transform="translate({x:.1}, 0)">"#,
                r#"<line stroke="currentColor" y2="6"/>"#,
                r#"<text fill="currentColor" y="9" dy="0.71em" text-anchor="middle">{label:.1}%</text>"#,
                "</g>"
            ),
            x = positions.position(i),
            label = value,
        )?;
    }
    g.push_str("</g></g>\n");

    Ok(g)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::build_education_index;
    use crate::types::EducationRecord;
    use geo::Polygon;

    fn square(fips: u32, origin: f64) -> CountyShape {
        let ring = vec![
            (origin, 0.0),
            (origin + 10.0, 0.0),
            (origin + 10.0, 10.0),
            (origin, 10.0),
            (origin, 0.0),
        ];
        CountyShape {
            fips,
            geometry: MultiPolygon::new(vec![Polygon::new(LineString::from(ring), vec![])]),
        }
    }

    fn record(fips: u32, value: f64, name: &str, state: &str) -> EducationRecord {
        EducationRecord {
            fips,
            area_name: name.to_string(),
            state: state.to_string(),
            bachelors_or_higher: value,
        }
    }

    fn two_county_page() -> RenderedPage {
        let shapes = vec![square(1, 0.0), square(2, 20.0)];
        let education = build_education_index(vec![
            record(1, 10.0, "A", "X"),
            record(2, 90.0, "B", "Y"),
        ]);
        render_page(&shapes, &education).unwrap()
    }

    #[test]
    fn fit_extent_is_uniform_and_centered() {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 });
        let p = Projection::fit_extent((100.0, -100.0), (1700.0, 1250.0), bounds);
        assert_eq!(p.scale, 13.5);
        assert_eq!(p.apply(Coord { x: 0.0, y: 0.0 }), (225.0, -100.0));
        assert_eq!(p.apply(Coord { x: 100.0, y: 100.0 }), (1575.0, 1250.0));
    }

    #[test]
    fn counties_carry_data_attributes_and_scale_colors() {
        let page = two_county_page();
        assert!(page.html.contains(r#"data-fips="1""#));
        assert!(page.html.contains(r#"data-fips="2""#));
        assert!(page.html.contains(r#"data-county-name="A" data-state-name="X""#));
        // Domain [10, 90]: the two records sit at opposite palette ends.
        assert!(page.html.contains(&format!(r#"fill="{}""#, GREENS_8[0])));
        assert!(page.html.contains(&format!(r#"fill="{}""#, GREENS_8[7])));
        assert_eq!(page.unmatched, 0);
    }

    #[test]
    fn legend_has_seven_swatches_and_nine_ticks() {
        let page = two_county_page();
        assert_eq!(page.html.matches("<rect ").count(), 7);
        assert_eq!(page.html.matches(r#"<g class="tick""#).count(), 9);
        assert!(page.html.contains(">10.0%<"));
        assert!(page.html.contains(">90.0%<"));
    }

    #[test]
    fn rendering_is_pure_and_idempotent() {
        let a = two_county_page();
        let b = two_county_page();
        assert_eq!(a.html, b.html);
        assert_eq!(a.html.matches(r#"id="legend""#).count(), 1);
        assert_eq!(a.html.matches(r#"id="title""#).count(), 1);
        assert_eq!(a.html.matches("<svg ").count(), 1);
    }

    #[test]
    fn unmatched_shape_renders_no_data_style() {
        let shapes = vec![square(1, 0.0), square(3, 20.0)];
        let education = build_education_index(vec![
            record(1, 10.0, "A", "X"),
            record(2, 90.0, "B", "Y"),
        ]);
        let page = render_page(&shapes, &education).unwrap();
        assert_eq!(page.unmatched, 1);
        assert!(page.html.contains(r#"class="county county--no-data" d="M"#));
        let no_data = page
            .html
            .lines()
            .flat_map(|l| l.split("<path "))
            .find(|p| p.contains("county--no-data"))
            .unwrap();
        assert!(!no_data.contains("data-education"));
        assert!(no_data.contains(&format!(r#"fill="{}""#, NO_DATA_FILL)));
    }

    #[test]
    fn page_contract_elements_are_present() {
        let page = two_county_page();
        assert!(page.html.contains(r#"<h1 id="title">United States Educational Attainment</h1>"#));
        assert!(page.html.contains(r#"<p id="description" class="description">"#));
        assert!(page.html.contains(r#"<svg width="1800" height="1300">"#));
        assert!(page.html.contains(r#"<g id="legend-axis" transform="translate(1000, 100)">"#));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let shapes = vec![square(1, 0.0)];
        let education =
            build_education_index(vec![record(1, 10.0, "O'Brien & <Sons>", "X")]);
        let page = render_page(&shapes, &education).unwrap();
        assert!(page.html.contains("O'Brien &amp; &lt;Sons&gt;"));
    }
}
