use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use geocluster_core::{
    BoundingBox, ClusterEngine, ClusterOutput, ClusterRecord, EngineConfig, SensorPoint, ViewState,
};

pub struct ClusterArgs {
    pub input: String,
    pub zoom: f64,
    pub max_clusters: Option<i64>,
    pub bbox: Option<String>,
    pub config: Option<String>,
    pub format: String,
}

pub fn run(args: &ClusterArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(Path::new(path))
            .with_context(|| format!("loading engine config {path}"))?,
        None => EngineConfig::default(),
    };
    let points = read_points(&args.input)?;
    let view = ViewState {
        zoom: args.zoom,
        bounding_box: args.bbox.as_deref().map(parse_bbox).transpose()?,
        max_clusters: args.max_clusters,
    };

    let output = ClusterEngine::new(config)?.cluster(&points, &view);

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        "text" => print_text(&output),
        other => bail!("unknown output format: {other} (expected text or json)"),
    }
    Ok(())
}

pub fn read_points(input: &str) -> anyhow::Result<Vec<SensorPoint>> {
    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {input}"))?
    };
    let points: Vec<SensorPoint> =
        serde_json::from_str(&content).with_context(|| format!("parsing points from {input}"))?;
    Ok(points)
}

/// Parse `minLat,maxLat,minLon,maxLon`.
pub fn parse_bbox(s: &str) -> anyhow::Result<BoundingBox> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid bbox: {s}"))?;
    let [min_lat, max_lat, min_lon, max_lon] = parts[..] else {
        bail!("bbox needs four values (minLat,maxLat,minLon,maxLon), got {}", parts.len());
    };
    Ok(BoundingBox::new(min_lat, max_lat, min_lon, max_lon))
}

fn print_text(output: &ClusterOutput) {
    println!(
        "{} clusters from {} points ({} dropped, {} outside viewport)",
        output.records.len(),
        output.stats.valid_points - output.stats.culled_points,
        output.dropped_count,
        output.stats.culled_points,
    );
    println!(
        "  cell {:.5}°, {} cells{}, {} merges",
        output.stats.cell_degrees,
        output.stats.occupied_cells,
        if output.stats.coarsened { " (coarsened)" } else { "" },
        output.stats.merges,
    );
    for record in &output.records {
        let c = record.centroid();
        match record {
            ClusterRecord::Singleton(p) => {
                println!("  • {:>9.4} {:>10.4}  {:<24} value={}", c.lat, c.lon, p.id, p.value);
            }
            ClusterRecord::Aggregate(a) => {
                println!(
                    "  ◉ {:>9.4} {:>10.4}  {:<24} max={}",
                    c.lat,
                    c.lon,
                    format!("{} sensors", a.member_count),
                    a.representative_value
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_bbox() {
        let bbox = parse_bbox("-10, 10,170,-170").unwrap();
        assert_eq!(bbox, BoundingBox::new(-10.0, 10.0, 170.0, -170.0));
    }

    #[test]
    fn rejects_short_bbox() {
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("1,2,x,4").is_err());
    }

    #[test]
    fn reads_point_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"a","lat":1.0,"lon":2.0,"value":0.5,"timestamp":10}},{{"id":"b","lat":3.0,"lon":4.0,"value":0.1}}]"#
        )
        .unwrap();

        let points = read_points(file.path().to_str().unwrap()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, Some(10));
        assert_eq!(points[1].timestamp, None);
    }

    #[test]
    fn cluster_command_runs_end_to_end() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"a","lat":10.0,"lon":10.0,"value":0.5}},{{"id":"b","lat":10.01,"lon":10.01,"value":0.9}}]"#
        )
        .unwrap();

        let args = ClusterArgs {
            input: file.path().to_str().unwrap().to_string(),
            zoom: 2.0,
            max_clusters: Some(1),
            bbox: None,
            config: None,
            format: "json".to_string(),
        };
        run(&args).unwrap();

        let bad_format = ClusterArgs {
            format: "yaml".to_string(),
            ..args
        };
        assert!(run(&bad_format).is_err());
    }
}
