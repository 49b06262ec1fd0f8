//! Feature table: a schema generated from the band count plus one row per
//! surviving segment.

#[cfg(any(feature = "polars", feature = "csv"))]
use anyhow::Context;
#[cfg(feature = "polars")]
use polars::prelude::*;

use super::radiometric::RadiometricFeatures;
use super::shape::ShapeFeatures;
use super::texture::TextureFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeMetric {
    Area,
    Perimeter,
    CompactnessIndex,
}

impl ShapeMetric {
    pub const ALL: [ShapeMetric; 3] = [
        ShapeMetric::Area,
        ShapeMetric::Perimeter,
        ShapeMetric::CompactnessIndex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShapeMetric::Area => "area",
            ShapeMetric::Perimeter => "perimeter",
            ShapeMetric::CompactnessIndex => "compacity_index",
        }
    }

    pub fn value(&self, shape: &ShapeFeatures) -> f64 {
        match self {
            ShapeMetric::Area => shape.area,
            ShapeMetric::Perimeter => shape.perimeter,
            ShapeMetric::CompactnessIndex => shape.compactness_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadiometricMetric {
    Min,
    Max,
    Mean,
    Median,
    Var,
    Kurtosis,
    Mode,
}

impl RadiometricMetric {
    pub const ALL: [RadiometricMetric; 7] = [
        RadiometricMetric::Min,
        RadiometricMetric::Max,
        RadiometricMetric::Mean,
        RadiometricMetric::Median,
        RadiometricMetric::Var,
        RadiometricMetric::Kurtosis,
        RadiometricMetric::Mode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RadiometricMetric::Min => "min",
            RadiometricMetric::Max => "max",
            RadiometricMetric::Mean => "mean",
            RadiometricMetric::Median => "median",
            RadiometricMetric::Var => "var",
            RadiometricMetric::Kurtosis => "kurtosis",
            RadiometricMetric::Mode => "mode",
        }
    }

    pub fn value(&self, stats: &RadiometricFeatures) -> f64 {
        match self {
            RadiometricMetric::Min => stats.min,
            RadiometricMetric::Max => stats.max,
            RadiometricMetric::Mean => stats.mean,
            RadiometricMetric::Median => stats.median,
            RadiometricMetric::Var => stats.var,
            RadiometricMetric::Kurtosis => stats.kurtosis,
            RadiometricMetric::Mode => stats.mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureMetric {
    Contrast,
    Dissimilarity,
    Homogeneity,
    Asm,
}

impl TextureMetric {
    pub const ALL: [TextureMetric; 4] = [
        TextureMetric::Contrast,
        TextureMetric::Dissimilarity,
        TextureMetric::Homogeneity,
        TextureMetric::Asm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TextureMetric::Contrast => "contrast",
            TextureMetric::Dissimilarity => "dissimilarity",
            TextureMetric::Homogeneity => "homogeneity",
            TextureMetric::Asm => "ASM",
        }
    }

    pub fn value(&self, texture: &TextureFeatures) -> f64 {
        match self {
            TextureMetric::Contrast => texture.contrast,
            TextureMetric::Dissimilarity => texture.dissimilarity,
            TextureMetric::Homogeneity => texture.homogeneity,
            TextureMetric::Asm => texture.asm,
        }
    }
}

/// One column of the feature table. Bands are 0-based here and 1-based in names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Id,
    Shape(ShapeMetric),
    Radiometric(RadiometricMetric, usize),
    Texture(TextureMetric, usize),
}

impl FeatureColumn {
    pub fn name(&self) -> String {
        match self {
            FeatureColumn::Id => "id".to_string(),
            FeatureColumn::Shape(metric) => metric.name().to_string(),
            FeatureColumn::Radiometric(metric, band) => format!("{}_{}", metric.name(), band + 1),
            FeatureColumn::Texture(metric, band) => format!("{}_{}", metric.name(), band + 1),
        }
    }
}

/// Ordered column list: id, shape, radiometric metric-then-band, texture metric-then-band
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    n_bands: usize,
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn new(n_bands: usize) -> Self {
        let mut columns = vec![FeatureColumn::Id];
        columns.extend(ShapeMetric::ALL.iter().map(|&m| FeatureColumn::Shape(m)));
        for metric in RadiometricMetric::ALL {
            columns.extend((0..n_bands).map(|band| FeatureColumn::Radiometric(metric, band)));
        }
        for metric in TextureMetric::ALL {
            columns.extend((0..n_bands).map(|band| FeatureColumn::Texture(metric, band)));
        }
        FeatureSchema { n_bands, columns }
    }

    pub fn n_bands(&self) -> usize {
        self.n_bands
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandFeatures {
    pub radiometric: RadiometricFeatures,
    pub texture: TextureFeatures,
}

/// Features of one surviving segment
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: i64,
    pub shape: ShapeFeatures,
    pub bands: Vec<BandFeatures>,
}

impl FeatureRow {
    /// Numeric value of a column; the id is returned as `f64`.
    ///
    /// Panics if the column refers to a band the row does not have.
    pub fn value(&self, column: &FeatureColumn) -> f64 {
        match column {
            FeatureColumn::Id => self.id as f64,
            FeatureColumn::Shape(metric) => metric.value(&self.shape),
            FeatureColumn::Radiometric(metric, band) => metric.value(&self.bands[*band].radiometric),
            FeatureColumn::Texture(metric, band) => metric.value(&self.bands[*band].texture),
        }
    }
}

/// Rows of surviving segments in ascending identifier order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: FeatureSchema,
    rows: Vec<FeatureRow>,
    degenerate_ids: Vec<i64>,
}

impl FeatureTable {
    pub fn new(n_bands: usize) -> Self {
        FeatureTable {
            schema: FeatureSchema::new(n_bands),
            rows: Vec::new(),
            degenerate_ids: Vec::new(),
        }
    }

    /// Append a row. Rows must arrive in ascending id order with one
    /// entry per band.
    pub fn push(&mut self, row: FeatureRow) {
        debug_assert_eq!(row.bands.len(), self.schema.n_bands());
        debug_assert!(self.rows.last().map_or(true, |last| last.id < row.id));
        if row.shape.is_degenerate() {
            self.degenerate_ids.push(row.id);
        }
        self.rows.push(row);
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.id).collect()
    }

    /// Segments whose perimeter is zero and whose compactness is undefined
    pub fn degenerate_ids(&self) -> &[i64] {
        &self.degenerate_ids
    }

    pub fn column(&self, column: &FeatureColumn) -> Vec<f64> {
        self.rows.iter().map(|r| r.value(column)).collect()
    }

    /// Look a column up by its name, e.g. `"mean_2"`.
    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        self.schema
            .columns()
            .iter()
            .find(|c| c.name() == name)
            .map(|c| self.column(c))
    }

    /// Convert to a Polars DataFrame with the schema's column order
    #[cfg(feature = "polars")]
    pub fn to_polars_df(&self) -> anyhow::Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.schema.len());
        for column in self.schema.columns() {
            let name = column.name();
            let series = match column {
                FeatureColumn::Id => Column::new(name.into(), self.ids()),
                _ => Column::new(name.into(), self.column(column)),
            };
            columns.push(series);
        }
        DataFrame::new(columns).context("Failed to create DataFrame")
    }

    /// Write the table as CSV with a header row
    #[cfg(feature = "csv")]
    pub fn to_csv_writer<W: std::io::Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.schema.names())
            .context("Failed to write CSV header")?;
        for row in &self.rows {
            let record: Vec<String> = self
                .schema
                .columns()
                .iter()
                .map(|column| match column {
                    FeatureColumn::Id => row.id.to_string(),
                    _ => row.value(column).to_string(),
                })
                .collect();
            wtr.write_record(&record)
                .with_context(|| format!("Failed to write CSV row for segment {}", row.id))?;
        }
        wtr.flush().context("Failed to flush CSV writer")?;
        Ok(())
    }

    #[cfg(feature = "csv")]
    pub fn write_csv<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
            }
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
        self.to_csv_writer(std::io::BufWriter::new(file))?;
        tracing::info!("Feature table saved to: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, perimeter: f64) -> FeatureRow {
        let radiometric = RadiometricFeatures {
            min: 1.0,
            max: 3.0,
            mean: 2.0,
            median: 2.0,
            var: 0.5,
            kurtosis: -1.5,
            mode: 1.0,
        };
        let texture = TextureFeatures {
            contrast: 0.25,
            dissimilarity: 0.5,
            homogeneity: 0.75,
            asm: 0.125,
        };
        FeatureRow {
            id,
            shape: ShapeFeatures {
                area: 4.0,
                perimeter,
                compactness_index: super::super::shape::compactness_index(4.0, perimeter),
            },
            bands: vec![
                BandFeatures {
                    radiometric,
                    texture,
                },
                BandFeatures {
                    radiometric: RadiometricFeatures {
                        mean: 20.0,
                        ..radiometric
                    },
                    texture,
                },
            ],
        }
    }

    #[test]
    fn test_schema_order_and_names() {
        let schema = FeatureSchema::new(2);
        assert_eq!(schema.len(), 1 + 3 + 7 * 2 + 4 * 2);
        let names = schema.names();
        assert_eq!(&names[..6], &["id", "area", "perimeter", "compacity_index", "min_1", "min_2"]);
        assert_eq!(names[6], "max_1");
        assert_eq!(names[18], "contrast_1");
        assert_eq!(names.last().map(String::as_str), Some("ASM_2"));
    }

    #[test]
    fn test_schema_without_bands() {
        let schema = FeatureSchema::new(0);
        assert_eq!(schema.names(), vec!["id", "area", "perimeter", "compacity_index"]);
    }

    #[test]
    fn test_table_columns() {
        let mut table = FeatureTable::new(2);
        table.push(row(3, 4.0));
        table.push(row(8, 0.0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.ids(), vec![3, 8]);
        assert_eq!(table.degenerate_ids(), &[8]);
        assert_eq!(table.column_by_name("mean_2"), Some(vec![20.0, 20.0]));
        assert_eq!(table.column_by_name("ASM_1"), Some(vec![0.125, 0.125]));
        assert!(table.column_by_name("mean_3").is_none());
    }

    #[cfg(feature = "polars")]
    #[test]
    fn test_to_polars_df() {
        let mut table = FeatureTable::new(2);
        table.push(row(1, 4.0));
        let df = table.to_polars_df().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), table.schema().len());
        assert!(df.column("id").is_ok());
        assert!(df.column("homogeneity_2").is_ok());
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_to_csv() {
        let mut table = FeatureTable::new(2);
        table.push(row(1, 4.0));
        let mut out = Vec::new();
        table.to_csv_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,area,perimeter,compacity_index,min_1"));
        assert!(lines.next().unwrap().starts_with("1,4,4,"));
        assert!(lines.next().is_none());
    }
}
