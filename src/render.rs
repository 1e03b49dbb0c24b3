use crate::config::{LegendConfig, RenderConfig};
use crate::error::MapError;
use crate::scale::ColorScale;
use crate::tooltip::{TooltipController, FADE_IN_MS, FADE_OUT_MS, POINTER_OFFSET, VISIBLE_OPACITY};
use crate::types::{ChoroplethMap, RenderedRegion};
use geo::{LineString, MultiPolygon};
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::info;

/// One legend rectangle in legend-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendSwatch {
    pub x: f64,
    pub width: f64,
    pub color: String,
    pub label: String,
}

/// Lays the buckets out on a shared linear scale from the domain onto
/// `[0, legend.width]`. A degenerate domain gets equal-width swatches.
pub fn legend_layout(scale: &ColorScale, legend: &LegendConfig) -> Vec<LegendSwatch> {
    let (min, max) = scale.domain();
    let buckets = scale.buckets();
    let span = max - min;
    let equal_width = legend.width / buckets.len() as f64;

    buckets
        .iter()
        .map(|bucket| {
            let (x, width) = if span > 0.0 {
                let x0 = (bucket.lower_bound - min) / span * legend.width;
                let x1 = (bucket.upper_bound - min) / span * legend.width;
                (x0, x1 - x0)
            } else {
                (bucket.index as f64 * equal_width, equal_width)
            };
            LegendSwatch {
                x,
                width,
                color: bucket.color.clone(),
                label: format!("{:.*}", legend.tick_decimals, bucket.lower_bound),
            }
        })
        .collect()
}

/// Draws the map surface: one path per region and the legend strip.
pub fn render_svg(map: &ChoroplethMap, config: &RenderConfig) -> String {
    let mut svg = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg id="map" xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = config.width,
        h = config.height
    );

    svg.push_str("<g class=\"counties\">\n");
    for region in &map.regions {
        write_region(&mut svg, map, region, config);
    }
    svg.push_str("</g>\n");

    write_legend(&mut svg, &map.scale, &config.legend);
    svg.push_str("</svg>\n");
    svg
}

fn write_region(svg: &mut String, map: &ChoroplethMap, region: &RenderedRegion, config: &RenderConfig) {
    let fill = map.fill_color(region, &config.unmatched_color);
    let _ = write!(svg, r#"<path class="county" data-fips="{}""#, region.shape.id);

    match (&region.record, TooltipController::content_for(region)) {
        (Some(record), Some(tooltip)) => {
            let _ = write!(
                svg,
                r#" data-education="{}" data-tooltip="{}""#,
                record.bachelors_or_higher,
                escape(&tooltip)
            );
        }
        _ => svg.push_str(r#" data-matched="false""#),
    }

    let _ = writeln!(svg, r#" fill="{}" d="{}"/>"#, escape(fill), path_data(&region.shape.geometry));
}

fn write_legend(svg: &mut String, scale: &ColorScale, legend: &LegendConfig) {
    let swatches = legend_layout(scale, legend);

    let _ = writeln!(
        svg,
        r#"<g id="legend" transform="translate({},{})">"#,
        num(legend.x),
        num(legend.y)
    );
    for swatch in &swatches {
        let _ = writeln!(
            svg,
            r#"<rect x="{}" y="0" width="{}" height="{}" fill="{}"/>"#,
            num(swatch.x),
            num(swatch.width),
            num(legend.height),
            escape(&swatch.color)
        );
    }

    // Axis below the strip, ticks at each bucket's lower bound.
    let _ = writeln!(
        svg,
        r#"<g class="axis" font-size="10" text-anchor="middle"><path d="M0,{h}H{w}" stroke="currentColor"/>"#,
        h = num(legend.height),
        w = num(legend.width)
    );
    for swatch in &swatches {
        let _ = writeln!(
            svg,
            r#"<g class="tick" transform="translate({},0)"><line y2="{}" stroke="currentColor"/><text y="{}">{}</text></g>"#,
            num(swatch.x),
            num(legend.height + 6.0),
            num(legend.height + 18.0),
            escape(&swatch.label)
        );
    }
    svg.push_str("</g>\n</g>\n");
}

/// Standalone HTML document wrapping the surface, the tooltip element and the
/// script that drives it.
pub fn render_page(map: &ChoroplethMap, config: &RenderConfig) -> String {
    let svg = render_svg(map, config);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; }}
#tooltip {{ position: absolute; opacity: 0; pointer-events: none; padding: 6px 8px; background: #ffffe0; border: 1px solid #999; border-radius: 4px; font-size: 12px; }}
path.county:hover {{ stroke: #333; stroke-width: 0.5; }}
</style>
</head>
<body>
<h1 id="title">{title}</h1>
<p id="description">{description}</p>
{svg}<div id="tooltip"></div>
<script>
{script}
</script>
</body>
</html>
"#,
        title = escape(&config.title),
        description = escape(&config.description),
        svg = svg,
        script = tooltip_script(),
    )
}

// The tooltip element exists before any handler is attached.
fn tooltip_script() -> String {
    format!(
        r#"(function () {{
  var tooltip = document.getElementById('tooltip');
  function hide() {{
    tooltip.style.transition = 'opacity {fade_out}ms';
    tooltip.style.opacity = 0;
  }}
  document.querySelectorAll('#map path.county').forEach(function (county) {{
    county.addEventListener('mouseenter', function (event) {{
      var content = county.getAttribute('data-tooltip');
      if (content === null) {{
        hide();
        return;
      }}
      tooltip.textContent = content;
      tooltip.setAttribute('data-education', county.getAttribute('data-education'));
      tooltip.style.left = (event.pageX {dx}) + 'px';
      tooltip.style.top = (event.pageY {dy}) + 'px';
      tooltip.style.transition = 'opacity {fade_in}ms';
      tooltip.style.opacity = {opacity};
    }});
    county.addEventListener('mouseleave', hide);
  }});
}})();"#,
        fade_in = FADE_IN_MS,
        fade_out = FADE_OUT_MS,
        dx = signed(POINTER_OFFSET.0),
        dy = signed(POINTER_OFFSET.1),
        opacity = VISIBLE_OPACITY,
    )
}

/// Writes the page through a temporary file so a re-run replaces the previous
/// output in one step.
pub fn write_page(path: &Path, html: &str) -> Result<(), MapError> {
    let io_err = |source| MapError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("html.tmp");
    fs::write(&tmp, html).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    info!("Wrote {} bytes to {:?}", html.len(), path);
    Ok(())
}

fn path_data(geometry: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for polygon in geometry {
        write_ring(&mut d, polygon.exterior());
        for interior in polygon.interiors() {
            write_ring(&mut d, interior);
        }
    }
    d
}

fn write_ring(d: &mut String, ring: &LineString<f64>) {
    let mut coords = ring.coords();
    // geo closes rings, so the final coordinate repeats the first.
    let len = ring.0.len().saturating_sub(1);
    if let Some(first) = coords.next() {
        let _ = write!(d, "M{},{}", num(first.x), num(first.y));
        for c in coords.take(len.saturating_sub(1)) {
            let _ = write!(d, "L{},{}", num(c.x), num(c.y));
        }
        d.push('Z');
    }
}

/// `+ 5` / `- 28`, for splicing an offset into an expression.
fn signed(v: f64) -> String {
    if v < 0.0 {
        format!("- {}", num(-v))
    } else {
        format!("+ {}", num(v))
    }
}

/// Rounds to three decimals and prints the shortest form.
fn num(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
