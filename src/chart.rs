//! Label distribution as an SVG pie chart.

use serde::Serialize;
use std::f64::consts::PI;
use std::fmt::Write as _;

use crate::pipeline::AggregateCounts;
use crate::sentiment::Label;

const SIZE: f64 = 220.0;
const RADIUS: f64 = 100.0;
const EMPTY_COLOR: &str = "#e5e7eb";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: Label,
    pub name: &'static str,
    pub count: usize,
    /// Share of the total in percent, one decimal when rendered.
    pub percent: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieChart {
    pub total: usize,
    pub slices: Vec<Slice>,
    pub svg: String,
}

impl PieChart {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Slices in label order (negative, neutral, positive), zero counts included.
pub fn slices(counts: &AggregateCounts) -> Vec<Slice> {
    Label::ALL
        .iter()
        .map(|&label| {
            let count = counts.get(label);
            let percent = if counts.total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / counts.total as f64
            };
            Slice {
                label,
                name: label.display_tr(),
                count,
                percent,
                color: label.color(),
            }
        })
        .collect()
}

pub fn pie_chart(counts: &AggregateCounts) -> PieChart {
    let slices = slices(counts);
    let svg = render_svg(counts.total, &slices);
    PieChart {
        total: counts.total,
        slices,
        svg,
    }
}

fn render_svg(total: usize, slices: &[Slice]) -> String {
    let c = SIZE / 2.0;
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {SIZE} {SIZE}" width="{SIZE}" height="{SIZE}" role="img">"#
    );

    if total == 0 {
        let _ = write!(
            out,
            r#"<circle cx="{c}" cy="{c}" r="{RADIUS}" fill="{EMPTY_COLOR}"/><text x="{c}" y="{c}" text-anchor="middle" dominant-baseline="middle" font-size="14">Veri yok</text></svg>"#
        );
        return out;
    }

    let drawn: Vec<&Slice> = slices.iter().filter(|s| s.count > 0).collect();
    if let [only] = drawn.as_slice() {
        let _ = write!(
            out,
            r#"<circle cx="{c}" cy="{c}" r="{RADIUS}" fill="{}"><title>{}: {}</title></circle>"#,
            only.color, only.name, only.count
        );
        let _ = write!(
            out,
            r#"<text x="{c}" y="{c}" text-anchor="middle" dominant-baseline="middle" font-size="14">{:.1}%</text>"#,
            only.percent
        );
        out.push_str("</svg>");
        return out;
    }

    // Start at 12 o'clock, clockwise.
    let mut start = -PI / 2.0;
    for s in drawn {
        let sweep = 2.0 * PI * s.count as f64 / total as f64;
        let end = start + sweep;
        let (x0, y0) = point(c, RADIUS, start);
        let (x1, y1) = point(c, RADIUS, end);
        let large = u8::from(sweep > PI);
        let _ = write!(
            out,
            r#"<path d="M{c},{c} L{x0:.2},{y0:.2} A{RADIUS},{RADIUS} 0 {large} 1 {x1:.2},{y1:.2} Z" fill="{}"><title>{}: {}</title></path>"#,
            s.color, s.name, s.count
        );
        let (tx, ty) = point(c, RADIUS * 0.62, start + sweep / 2.0);
        let _ = write!(
            out,
            r#"<text x="{tx:.2}" y="{ty:.2}" text-anchor="middle" dominant-baseline="middle" font-size="12">{:.1}%</text>"#,
            s.percent
        );
        start = end;
    }
    out.push_str("</svg>");
    out
}

fn point(c: f64, r: f64, angle: f64) -> (f64, f64) {
    (c + r * angle.cos(), c + r * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(negative: usize, neutral: usize, positive: usize) -> AggregateCounts {
        AggregateCounts {
            total: negative + neutral + positive,
            negative,
            neutral,
            positive,
        }
    }

    #[test]
    fn empty_state_when_no_items() {
        let chart = pie_chart(&counts(0, 0, 0));
        assert!(chart.is_empty());
        assert!(chart.svg.contains("Veri yok"));
        assert!(chart.slices.iter().all(|s| s.percent == 0.0));
    }

    #[test]
    fn single_label_is_a_full_circle() {
        let chart = pie_chart(&counts(0, 0, 3));
        assert!(chart.svg.contains("<circle"));
        assert!(chart.svg.contains("#16a34a"));
        assert!(!chart.svg.contains("<path"));
        assert!(chart.svg.contains("100.0%"));
    }

    #[test]
    fn slices_follow_label_order_and_colors() {
        let chart = pie_chart(&counts(1, 1, 2));
        let names: Vec<_> = chart.slices.iter().map(|s| s.label).collect();
        assert_eq!(names, Label::ALL.to_vec());
        assert_eq!(chart.svg.matches("<path").count(), 3);
        assert!(chart.svg.contains("#dc2626"));
        assert!(chart.svg.contains("#facc15"));
        assert!(chart.svg.contains("50.0%"));
        assert!(chart.svg.contains("25.0%"));
    }

    #[test]
    fn zero_slices_are_not_drawn() {
        let chart = pie_chart(&counts(1, 0, 1));
        assert_eq!(chart.svg.matches("<path").count(), 2);
        assert_eq!(chart.slices[1].count, 0);
    }
}
