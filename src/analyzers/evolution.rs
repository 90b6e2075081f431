//! Magmatic evolution-index analyzer.
//!
//! For geochemical datasets carrying SiO2, MgO and K2O columns, the degree
//! of magmatic differentiation is scored per row as SiO2 + K2O − MgO and
//! the highest-scoring sample is reported with its contributing values.

use crate::dataset::{cell_to_f64, cell_to_string, find_column, row_get, Row};

use super::Analyzer;

const TRIGGER_KEYWORDS: &[&str] = &["evolution", "evolved", "differentiation", "differentiated"];

pub struct EvolutionIndexAnalyzer;

impl Analyzer for EvolutionIndexAnalyzer {
    fn name(&self) -> &'static str {
        "evolution_index"
    }

    fn matches(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        TRIGGER_KEYWORDS.iter().any(|k| q.contains(k))
    }

    fn analyze(&self, _question: &str, columns: &[String], rows: &[Row]) -> Option<String> {
        let sio2_col = find_column(columns, &["sio2"])?;
        let mgo_col = find_column(columns, &["mgo"])?;
        let k2o_col = find_column(columns, &["k2o"])?;
        let id_col = find_column(columns, &["sample"]).or_else(|| columns.first().map(|c| c.as_str()))?;
        let rock_col = find_column(columns, &["rock", "type"]);

        // Highest index over rows where all three components are numeric.
        let mut best: Option<(&Row, f64, f64, f64, f64)> = None;
        for row in rows {
            let sio2 = row_get(row, sio2_col).and_then(cell_to_f64);
            let mgo = row_get(row, mgo_col).and_then(cell_to_f64);
            let k2o = row_get(row, k2o_col).and_then(cell_to_f64);
            let (Some(sio2), Some(mgo), Some(k2o)) = (sio2, mgo, k2o) else {
                continue;
            };
            let index = sio2 + k2o - mgo;
            if best.as_ref().is_none_or(|(_, i, ..)| index > *i) {
                best = Some((row, index, sio2, mgo, k2o));
            }
        }
        let (row, index, sio2, mgo, k2o) = best?;

        let sample = row_get(row, id_col).map(cell_to_string).unwrap_or_default();
        let rock_info = rock_col
            .and_then(|c| row_get(row, c))
            .map(cell_to_string)
            .filter(|s| !s.is_empty())
            .map(|r| format!(", with rock type {r}"))
            .unwrap_or_default();

        Some(format!(
            "Sample {sample} shows the highest degree of evolution{rock_info}. \
             Its evolution index is {index:.1} (SiO2 {sio2}% + K2O {k2o}% - MgO {mgo}% = {index:.1}). \
             High SiO2 and K2O contents combined with low MgO indicate a more strongly \
             differentiated magma."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<String> {
        ["SampleID", "RockType", "SiO2", "MgO", "K2O"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn row(id: &str, rock: &str, sio2: f64, mgo: f64, k2o: f64) -> Row {
        vec![
            ("SampleID".to_string(), json!(id)),
            ("RockType".to_string(), json!(rock)),
            ("SiO2".to_string(), json!(sio2)),
            ("MgO".to_string(), json!(mgo)),
            ("K2O".to_string(), json!(k2o)),
        ]
    }

    #[test]
    fn picks_row_with_highest_index() {
        let rows = vec![
            row("S-01", "granite", 60.0, 2.0, 4.0), // index 62
            row("S-02", "basalt", 50.0, 5.0, 2.0),  // index 47
        ];
        let narrative = EvolutionIndexAnalyzer
            .analyze("which sample is most evolved?", &columns(), &rows)
            .unwrap();
        assert!(narrative.contains("S-01"));
        assert!(narrative.contains("62.0"));
        assert!(narrative.contains("granite"));
    }

    #[test]
    fn missing_component_column_falls_through() {
        let columns: Vec<String> = ["SampleID", "SiO2", "MgO"].iter().map(|s| s.to_string()).collect();
        assert!(EvolutionIndexAnalyzer.analyze("evolution?", &columns, &[]).is_none());
    }

    #[test]
    fn non_numeric_rows_are_skipped() {
        let rows = vec![
            vec![
                ("SampleID".to_string(), json!("S-bad")),
                ("RockType".to_string(), json!("")),
                ("SiO2".to_string(), json!("")),
                ("MgO".to_string(), json!(2.0)),
                ("K2O".to_string(), json!(4.0)),
            ],
            row("S-02", "basalt", 50.0, 5.0, 2.0),
        ];
        let narrative = EvolutionIndexAnalyzer
            .analyze("most evolved sample?", &columns(), &rows)
            .unwrap();
        assert!(narrative.contains("S-02"));
    }

    #[test]
    fn empty_dataset_falls_through() {
        assert!(EvolutionIndexAnalyzer.analyze("evolution?", &columns(), &[]).is_none());
    }

    #[test]
    fn sample_column_falls_back_to_first_column() {
        let columns: Vec<String> =
            ["Specimen", "SiO2", "MgO", "K2O"].iter().map(|s| s.to_string()).collect();
        let rows = vec![vec![
            ("Specimen".to_string(), json!("X-9")),
            ("SiO2".to_string(), json!(70.0)),
            ("MgO".to_string(), json!(1.0)),
            ("K2O".to_string(), json!(5.0)),
        ]];
        let narrative = EvolutionIndexAnalyzer.analyze("evolution?", &columns, &rows).unwrap();
        assert!(narrative.contains("X-9"));
        assert!(narrative.contains("74.0"));
    }

    #[test]
    fn trigger_keywords() {
        let a = EvolutionIndexAnalyzer;
        assert!(a.matches("which sample is the most EVOLVED?"));
        assert!(a.matches("rank by differentiation"));
        assert!(!a.matches("what is the average salary?"));
    }
}
