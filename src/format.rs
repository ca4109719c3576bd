//! Text output of cell statistics through format strings.
//!
//! | code | output |
//! |------|--------|
//! | `%i` | particle id |
//! | `%x` `%y` `%z` | particle position components |
//! | `%q` | particle position |
//! | `%r` | particle radius |
//! | `%w` | vertex count |
//! | `%p` | vertices relative to the particle |
//! | `%P` | vertices in global coordinates |
//! | `%o` | vertex orders |
//! | `%m` | squared distance to the furthest vertex |
//! | `%g` | edge count |
//! | `%E` | total edge length |
//! | `%e` | face perimeters |
//! | `%s` | face count |
//! | `%F` | surface area |
//! | `%A` | face order histogram |
//! | `%a` | face orders |
//! | `%f` | face areas |
//! | `%t` | vertex index cycles of the faces |
//! | `%l` | face normals |
//! | `%n` | neighbor ids (neighbor-tracking cells only) |
//! | `%v` | volume |
//! | `%c` | centroid relative to the particle |
//! | `%C` | centroid in global coordinates |
//! | `%%` | a literal `%` |
//!
//! Other codes are copied through unchanged. Numbers are printed like C's `%g`.

use std::fmt::Write;

use crate::cell::FaceTag;
use crate::tessellation::CellReport;

/// Formats a number with six significant digits, switching to exponent notation for very
/// large or small magnitudes and dropping trailing zeros.
pub fn format_g(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    let sci = format!("{:.5e}", v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if (-4..6).contains(&exp) {
        let decimals = (5 - exp) as usize;
        trim_zeros(format!("{:.*}", decimals, v))
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa.to_string()), sign, exp.abs())
    }
}

fn trim_zeros(s: String) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

fn triple(v: [f64; 3]) -> String {
    format!("{} {} {}", format_g(v[0]), format_g(v[1]), format_g(v[2]))
}

fn tuples(list: &[[f64; 3]]) -> String {
    list.iter()
        .map(|v| format!("({},{},{})", format_g(v[0]), format_g(v[1]), format_g(v[2])))
        .collect::<Vec<_>>()
        .join(" ")
}

fn numbers(list: &[f64]) -> String {
    list.iter().map(|&v| format_g(v)).collect::<Vec<_>>().join(" ")
}

fn integers<I: ToString>(list: &[I]) -> String {
    list.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

/// Renders `fmt` for one cell.
pub fn render<T: FaceTag>(fmt: &str, report: &CellReport<T>) -> String {
    let cell = &report.cell;
    let pos = report.position;
    let mut out = String::with_capacity(fmt.len() * 4);
    let mut chars = fmt.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(code) = chars.next() else {
            out.push('%');
            break;
        };
        let _ = match code {
            'i' => write!(out, "{}", report.id),
            'x' => write!(out, "{}", format_g(pos[0])),
            'y' => write!(out, "{}", format_g(pos[1])),
            'z' => write!(out, "{}", format_g(pos[2])),
            'q' => write!(out, "{}", triple(pos)),
            'r' => write!(out, "{}", format_g(report.radius)),
            'w' => write!(out, "{}", cell.vertex_count()),
            'p' => write!(out, "{}", tuples(cell.vertices())),
            'P' => write!(out, "{}", tuples(&cell.vertices_global(pos))),
            'o' => write!(out, "{}", integers(&cell.vertex_orders())),
            'm' => write!(out, "{}", format_g(cell.max_radius_squared())),
            'g' => write!(out, "{}", cell.number_of_edges()),
            'E' => write!(out, "{}", format_g(cell.total_edge_distance())),
            'e' => write!(out, "{}", numbers(&cell.face_perimeters())),
            's' => write!(out, "{}", cell.number_of_faces()),
            'F' => write!(out, "{}", format_g(cell.surface_area())),
            'A' => write!(out, "{}", integers(&cell.face_freq_table())),
            'a' => write!(out, "{}", integers(&cell.face_orders())),
            'f' => write!(out, "{}", numbers(&cell.face_areas())),
            't' => {
                let faces: Vec<String> = cell
                    .face_vertices()
                    .iter()
                    .map(|f| format!("({})", f.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")))
                    .collect();
                write!(out, "{}", faces.join(" "))
            }
            'l' => write!(out, "{}", tuples(&cell.normals())),
            'n' => write!(out, "{}", integers(&cell.neighbors())),
            'v' => write!(out, "{}", format_g(cell.volume())),
            'c' => write!(out, "{}", triple(cell.centroid())),
            'C' => write!(out, "{}", triple(report.centroid())),
            '%' => write!(out, "%"),
            other => write!(out, "%{}", other),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, NeighborCell};
    use crate::config::Config;

    fn cube_report() -> CellReport<i32> {
        let cell: NeighborCell = Cell::new_box([-0.5; 3], [0.5; 3], Config::default());
        CellReport { id: 3, position: [1.0, 2.0, 3.0], radius: 0.0, cell }
    }

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(0.125), "0.125");
        assert_eq!(format_g(1.0 / 3.0), "0.333333");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(-2.5), "-2.5");
    }

    #[test]
    fn test_render_cube() {
        let r = cube_report();
        assert_eq!(render("%i %q %v", &r), "3 1 2 3 1");
        assert_eq!(render("%w %g %s %F", &r), "8 12 6 6");
        assert_eq!(render("%A", &r), "0 0 0 0 6");
        assert_eq!(render("%C", &r), "1 2 3");
        assert_eq!(render("%m", &r), "0.75");
        let mut n: Vec<i32> = render("%n", &r).split(' ').map(|s| s.parse().unwrap()).collect();
        n.sort();
        assert_eq!(n, vec![-6, -5, -4, -3, -2, -1]);
    }

    #[test]
    fn test_render_passes_unknown_codes() {
        let r = cube_report();
        assert_eq!(render("100%% %k %", &r), "100% %k %");
        assert_eq!(render("no codes", &r), "no codes");
        assert!(render("%p", &r).starts_with("(-0.5,-0.5,-0.5)"));
        assert!(render("%t", &r).starts_with("(0,"));
    }
}
