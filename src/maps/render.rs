// SVG rendering of the choropleth maps.

use std::collections::HashMap;
use std::fmt::Write;

use county_subsidies::{CleanTable, ClipBounds, Fips, Year};
use log::debug;

use crate::maps::io_geojson::{County, GeoReference};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses "#rrggbb".
    pub fn parse(s: &str) -> Option<Rgb> {
        let h = s.trim().strip_prefix('#')?;
        if h.len() != 6 || !h.is_ascii() {
            return None;
        }
        let c = |i: usize| u8::from_str_radix(&h[i..i + 2], 16).ok();
        Some(Rgb(c(0)?, c(2)?, c(4)?))
    }

    pub fn lerp(&self, other: &Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let f = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(f(self.0, other.0), f(self.1, other.1), f(self.2, other.2))
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// The fixed rendering parameters.
#[derive(PartialEq, Debug, Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Used to express the physical size of the document.
    pub dpi: u32,
    pub fps: u32,
    pub frames_per_year: u32,
    pub end_pause_frames: u32,
    pub bins: usize,
    pub low_color: Rgb,
    pub high_color: Rgb,
    pub no_data_color: Rgb,
    pub title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 960,
            height: 600,
            dpi: 96,
            fps: 10,
            frames_per_year: 10,
            end_pause_frames: 30,
            bins: 8,
            low_color: Rgb(0xf7, 0xfc, 0xb9),
            high_color: Rgb(0x00, 0x45, 0x29),
            no_data_color: Rgb(0xd9, 0xd9, 0xd9),
            title: "Agricultural subsidies by county".to_string(),
        }
    }
}

const MARGIN: f64 = 20.0;
const TITLE_HEIGHT: f64 = 40.0;
const LEGEND_HEIGHT: f64 = 50.0;
const COUNTIES_GROUP: &str =
    "  <g id=\"counties\" stroke=\"#ffffff\" stroke-width=\"0.5\" fill-rule=\"evenodd\">\n";

/// Equirectangular projection, with the longitudes scaled by the cosine of the
/// mean latitude, fitted into a box.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Projection {
    min_lon: f64,
    max_lat: f64,
    kx: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    /// bbox: (min_lon, min_lat, max_lon, max_lat)
    pub fn fit(bbox: (f64, f64, f64, f64), x0: f64, y0: f64, w: f64, h: f64) -> Projection {
        let (min_lon, min_lat, max_lon, max_lat) = bbox;
        let kx = ((min_lat + max_lat) / 2.0).to_radians().cos().abs().max(1e-6);
        let span_x = ((max_lon - min_lon) * kx).max(1e-9);
        let span_y = (max_lat - min_lat).max(1e-9);
        let scale = (w / span_x).min(h / span_y);
        Projection {
            min_lon,
            max_lat,
            kx,
            scale,
            offset_x: x0 + (w - span_x * scale) / 2.0,
            offset_y: y0 + (h - span_y * scale) / 2.0,
        }
    }

    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            self.offset_x + (lon - self.min_lon) * self.kx * self.scale,
            self.offset_y + (self.max_lat - lat) * self.scale,
        )
    }
}

/// Equal-width bins over the display range, coloured from low to high.
#[derive(PartialEq, Debug, Clone)]
pub struct ColorScale {
    low: f64,
    high: f64,
    colors: Vec<Rgb>,
}

impl ColorScale {
    pub fn new(bounds: &ClipBounds, bins: usize, low_color: Rgb, high_color: Rgb) -> ColorScale {
        let n = bins.max(1);
        let colors = (0..n)
            .map(|i| {
                if n == 1 {
                    low_color
                } else {
                    low_color.lerp(&high_color, i as f64 / (n - 1) as f64)
                }
            })
            .collect();
        ColorScale {
            low: bounds.low(),
            high: bounds.high(),
            colors,
        }
    }

    fn width(&self) -> f64 {
        (self.high - self.low) / self.colors.len() as f64
    }

    pub fn bin(&self, value: f64) -> usize {
        let n = self.colors.len();
        if self.high <= self.low {
            return 0;
        }
        let i = ((value - self.low) / self.width()).floor();
        if i < 0.0 {
            0
        } else {
            (i as usize).min(n - 1)
        }
    }

    pub fn color(&self, value: f64) -> Rgb {
        self.colors[self.bin(value)]
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// The labels of the bin edges, one more than the bins. The ends are the clamp bounds:
    /// "X-" is X and below, "X+" is X and above.
    pub fn legend(&self) -> Vec<String> {
        let n = self.colors.len();
        let w = self.width();
        (0..=n)
            .map(|i| {
                if i == 0 {
                    format!("{}-", format_compact(self.low))
                } else if i == n {
                    format!("{}+", format_compact(self.high))
                } else {
                    format_compact(self.low + w * i as f64)
                }
            })
            .collect()
    }
}

/// 50000000 -> "50M", 2500000 -> "2.5M", 750000 -> "750K"
pub fn format_compact(v: f64) -> String {
    let a = v.abs();
    let (x, suffix) = if a >= 1e9 {
        (v / 1e9, "B")
    } else if a >= 1e6 {
        (v / 1e6, "M")
    } else if a >= 1e3 {
        (v / 1e3, "K")
    } else {
        (v, "")
    };
    let s = format!("{:.1}", x);
    let s = s.strip_suffix(".0").unwrap_or(&s).to_string();
    if s == "-0" {
        format!("0{}", suffix)
    } else {
        format!("{}{}", s, suffix)
    }
}

/// The key times (fractions of the whole animation) of each year, followed by 1.0
/// when the last year is held for a pause.
pub fn key_times(num_years: usize, frames_per_year: u32, end_pause_frames: u32) -> Vec<f64> {
    if num_years == 0 {
        return vec![];
    }
    let last = ((num_years - 1) as u64) * frames_per_year as u64;
    let total = (last + end_pause_frames as u64).max(1);
    let mut res: Vec<f64> = (0..num_years)
        .map(|i| (i as u64 * frames_per_year as u64) as f64 / total as f64)
        .collect();
    if last < total {
        res.push(1.0);
    }
    res
}

fn total_frames(num_years: usize, opts: &RenderOptions) -> u64 {
    let last = (num_years.max(1) as u64 - 1) * opts.frames_per_year as u64;
    (last + opts.end_pause_frames as u64).max(1)
}

fn ring_path(ring: &[(f64, f64)], proj: &Projection, out: &mut String) {
    for (i, (lon, lat)) in ring.iter().enumerate() {
        let (x, y) = proj.project(*lon, *lat);
        let cmd = if i == 0 { 'M' } else { 'L' };
        let _ = write!(out, "{}{:.1},{:.1}", cmd, x, y);
    }
    out.push('Z');
}

fn county_path(county: &County, proj: &Projection) -> String {
    let mut d = String::new();
    for polygon in county.polygons.iter() {
        for ring in polygon.iter() {
            ring_path(ring, proj, &mut d);
        }
    }
    d
}

fn map_projection(geo: &GeoReference, opts: &RenderOptions) -> Projection {
    let w = opts.width as f64;
    let h = opts.height as f64;
    Projection::fit(
        geo.bbox(),
        MARGIN,
        MARGIN + TITLE_HEIGHT,
        w - 2.0 * MARGIN,
        h - 2.0 * MARGIN - TITLE_HEIGHT - LEGEND_HEIGHT,
    )
}

/// The display value of every key for one year. With repeated pairs, the first row wins.
fn values_for_year(table: &CleanTable, year: Year) -> HashMap<Fips, f64> {
    let mut res: HashMap<Fips, f64> = HashMap::new();
    for d in table.records.iter().filter(|d| d.record.year == year) {
        res.entry(d.record.fips).or_insert(d.display_value);
    }
    res
}

fn svg_header(opts: &RenderOptions) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{:.2}in" height="{:.2}in" viewBox="0 0 {} {}">
  <rect width="{}" height="{}" fill="#ffffff"/>
  <text x="{}" y="{}" font-family="sans-serif" font-size="18" font-weight="600" fill="#374151">{}</text>
"##,
        opts.width as f64 / opts.dpi as f64,
        opts.height as f64 / opts.dpi as f64,
        opts.width,
        opts.height,
        opts.width,
        opts.height,
        MARGIN,
        MARGIN + 18.0,
        escape(&opts.title),
    )
}

fn svg_legend(scale: &ColorScale, opts: &RenderOptions) -> String {
    let colors = scale.colors();
    let labels = scale.legend();
    let y = opts.height as f64 - MARGIN - LEGEND_HEIGHT + 15.0;
    let cell = (opts.width as f64 - 2.0 * MARGIN) / colors.len() as f64;
    let mut s = String::from(
        "  <g id=\"legend\" font-family=\"sans-serif\" font-size=\"11\" fill=\"#6b7280\">\n",
    );
    for (i, c) in colors.iter().enumerate() {
        let _ = writeln!(
            s,
            r##"    <rect x="{:.1}" y="{:.1}" width="{:.1}" height="12" fill="{}"/>"##,
            MARGIN + cell * i as f64,
            y,
            cell,
            c.hex()
        );
    }
    // Edge labels: the outer ones are aligned inside the bar.
    for (i, label) in labels.iter().enumerate() {
        let anchor = if i == 0 {
            "start"
        } else if i == labels.len() - 1 {
            "end"
        } else {
            "middle"
        };
        let _ = writeln!(
            s,
            r##"    <text x="{:.1}" y="{:.1}" text-anchor="{}">{}</text>"##,
            MARGIN + cell * i as f64,
            y + 26.0,
            anchor,
            escape(label)
        );
    }
    s.push_str("  </g>\n");
    s
}

fn year_caption_position(opts: &RenderOptions) -> (f64, f64) {
    (opts.width as f64 - MARGIN, MARGIN + 18.0)
}

/// A map of one year. Counties of the reference without a record for this year
/// use the "no data" colour.
pub fn render_static_svg(
    table: &CleanTable,
    geo: &GeoReference,
    opts: &RenderOptions,
    year: Year,
) -> String {
    let proj = map_projection(geo, opts);
    let scale = ColorScale::new(&table.bounds, opts.bins, opts.low_color, opts.high_color);
    let values = values_for_year(table, year);
    debug!(
        "render_static_svg: year {:?}: {:?} values, {:?} counties",
        year,
        values.len(),
        geo.counties.len()
    );

    let mut s = svg_header(opts);
    s.push_str(COUNTIES_GROUP);
    for county in geo.counties.iter() {
        let (fill, label) = match values.get(&county.fips) {
            Some(v) => (scale.color(*v), format_compact(*v)),
            None => (opts.no_data_color, "no data".to_string()),
        };
        let _ = writeln!(
            s,
            r##"    <path id="c{}" d="{}" fill="{}"><title>{}: {}</title></path>"##,
            county.fips,
            county_path(county, &proj),
            fill.hex(),
            county.fips,
            label
        );
    }
    s.push_str("  </g>\n");
    let (x, y) = year_caption_position(opts);
    let _ = writeln!(
        s,
        r##"  <text x="{:.1}" y="{:.1}" text-anchor="end" font-family="sans-serif" font-size="18" fill="#374151">{}</text>"##,
        x, y, year
    );
    s.push_str(&svg_legend(&scale, opts));
    s.push_str("</svg>\n");
    s
}

/// A map animated over all the years of the table.
///
/// Each year is a key frame; the colours move linearly from one year to the next and the
/// last year is held for the end pause.
pub fn render_animated_svg(table: &CleanTable, geo: &GeoReference, opts: &RenderOptions) -> String {
    let proj = map_projection(geo, opts);
    let scale = ColorScale::new(&table.bounds, opts.bins, opts.low_color, opts.high_color);
    let years = &table.years;
    let times = key_times(years.len(), opts.frames_per_year, opts.end_pause_frames);
    let key_times_s = times
        .iter()
        .map(|t| format!("{:.4}", t))
        .collect::<Vec<String>>()
        .join(";");
    let dur = total_frames(years.len(), opts) as f64 / opts.fps as f64;
    let per_year: Vec<HashMap<Fips, f64>> =
        years.iter().map(|y| values_for_year(table, *y)).collect();
    debug!(
        "render_animated_svg: {:?} years, {:?} key times, duration {:?}s",
        years.len(),
        times.len(),
        dur
    );

    // The value list has one entry per key time: the pause repeats the last year.
    let with_pause = |mut v: Vec<String>| {
        if times.len() > years.len() {
            if let Some(last) = v.last().cloned() {
                v.push(last);
            }
        }
        v.join(";")
    };

    let mut s = svg_header(opts);
    s.push_str(COUNTIES_GROUP);
    for county in geo.counties.iter() {
        let colors: Vec<String> = per_year
            .iter()
            .map(|vals| match vals.get(&county.fips) {
                Some(v) => scale.color(*v).hex(),
                None => opts.no_data_color.hex(),
            })
            .collect();
        let first = colors
            .first()
            .cloned()
            .unwrap_or_else(|| opts.no_data_color.hex());
        if years.is_empty() {
            let _ = writeln!(
                s,
                r##"    <path id="c{}" d="{}" fill="{}"/>"##,
                county.fips,
                county_path(county, &proj),
                first
            );
            continue;
        }
        let _ = writeln!(
            s,
            r##"    <path id="c{}" d="{}" fill="{}"><animate attributeName="fill" dur="{:.2}s" repeatCount="indefinite" calcMode="linear" keyTimes="{}" values="{}"/></path>"##,
            county.fips,
            county_path(county, &proj),
            first,
            dur,
            key_times_s,
            with_pause(colors)
        );
    }
    s.push_str("  </g>\n");

    let (x, y) = year_caption_position(opts);
    s.push_str(
        "  <g id=\"years\" font-family=\"sans-serif\" font-size=\"18\" fill=\"#374151\" text-anchor=\"end\">\n",
    );
    for (i, year) in years.iter().enumerate() {
        let opacities: Vec<String> = (0..years.len())
            .map(|j| (if i == j { "1" } else { "0" }).to_string())
            .collect();
        let _ = writeln!(
            s,
            r##"    <text x="{:.1}" y="{:.1}" opacity="{}">{}<animate attributeName="opacity" dur="{:.2}s" repeatCount="indefinite" calcMode="discrete" keyTimes="{}" values="{}"/></text>"##,
            x,
            y,
            if i == 0 { "1" } else { "0" },
            year,
            dur,
            key_times_s,
            with_pause(opacities)
        );
    }
    s.push_str("  </g>\n");
    s.push_str(&svg_legend(&scale, opts));
    s.push_str("</svg>\n");
    s
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
