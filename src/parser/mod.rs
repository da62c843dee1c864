pub mod columns;
pub mod numeric;

use scraper::{ElementRef, Html, Selector};

use crate::config::ExtractorSettings;
use crate::error::{ConfigError, ExtractCause, ExtractError};
use crate::model::{DirectorDealing, Field};
use crate::observer::PipelineObserver;
use columns::ColumnMap;

/// Compiled selectors plus layout rules for one dealings table.
#[derive(Debug, Clone)]
pub struct Extractor {
    stock_code: String,
    container: Selector,
    row: Selector,
    cell_group: Selector,
    beneficiary: Selector,
    price: Selector,
    header_rows: usize,
    columns: ColumnMap,
    strict_columns: bool,
}

fn compile(name: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        name,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl Extractor {
    pub fn new(settings: &ExtractorSettings, stock_code: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            stock_code: stock_code.to_string(),
            container: compile("container", &settings.container)?,
            row: compile("row", &settings.row)?,
            cell_group: compile("cell_group", &settings.cell_group)?,
            beneficiary: compile("beneficiary", &settings.beneficiary)?,
            price: compile("price", &settings.price)?,
            header_rows: settings.header_rows,
            columns: ColumnMap::from_names(&settings.columns)?,
            strict_columns: settings.strict_columns,
        })
    }

    pub fn stock_code(&self) -> &str {
        &self.stock_code
    }

    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    /// Walk the dealings panel once. Rows before `header_rows` are skipped by
    /// position; every later row yields exactly one result. A page without
    /// the panel yields nothing.
    pub fn extract<'a>(
        &'a self,
        document: &'a Html,
        observer: &'a dyn PipelineObserver,
    ) -> impl Iterator<Item = Result<DirectorDealing, ExtractError>> + 'a {
        document
            .select(&self.container)
            .next()
            .into_iter()
            .flat_map(move |panel| panel.select(&self.row).enumerate())
            .filter(move |(index, _)| *index >= self.header_rows)
            .map(move |(index, row)| self.extract_row(index, row, observer))
    }

    /// Convenience for callers holding raw markup.
    pub fn extract_html(
        &self,
        html: &str,
        observer: &dyn PipelineObserver,
    ) -> Vec<Result<DirectorDealing, ExtractError>> {
        let document = Html::parse_document(html);
        self.extract(&document, observer).collect()
    }

    fn extract_row(
        &self,
        index: usize,
        row: ElementRef<'_>,
        observer: &dyn PipelineObserver,
    ) -> Result<DirectorDealing, ExtractError> {
        let fail = |field: Field, raw: &str, cause: ExtractCause| ExtractError {
            row: index,
            field,
            raw: raw.to_string(),
            cause,
        };

        let mut draft = Draft::default();
        let mut seen = 0;
        for (position, cell) in row.select(&self.cell_group).enumerate() {
            let Some(field) = self.columns.field_at(position) else {
                break;
            };
            seen = position + 1;
            let text = cell_text(cell);
            match field {
                Field::Date => draft.date = text,
                Field::DealType => draft.deal_type = text,
                Field::Value => {
                    draft.value =
                        numeric::parse_integer(&text).map_err(|c| fail(field, &text, c))?
                }
                Field::Volume => {
                    draft.volume =
                        numeric::parse_integer(&text).map_err(|c| fail(field, &text, c))?
                }
                _ => {}
            }
        }

        let missing = self.columns.fields_from(seen);
        if !missing.is_empty() {
            if self.strict_columns {
                return Err(fail(missing[0], "", ExtractCause::MissingCell { position: seen }));
            }
            observer.on_missing_columns(index, missing);
        }

        let beneficiary = first_text(row, &self.beneficiary);
        let price_text = first_text(row, &self.price);
        let price = numeric::parse_decimal(&price_text)
            .map_err(|c| fail(Field::Price, &price_text, c))?;

        Ok(DirectorDealing::new(
            self.stock_code.as_str(),
            draft.date,
            beneficiary,
            draft.deal_type,
            draft.value,
            draft.volume,
            price,
        ))
    }
}

/// Positional fields collected while walking one row.
#[derive(Default)]
struct Draft {
    date: String,
    deal_type: String,
    value: i64,
    volume: i64,
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector).next().map(cell_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Silent;
    use std::cell::RefCell;

    fn extractor() -> Extractor {
        Extractor::new(&ExtractorSettings::default(), "SSW").unwrap()
    }

    fn row(
        date: &str,
        deal: &str,
        value: &str,
        volume: &str,
        who: Option<&str>,
        price: &str,
    ) -> String {
        let who = who
            .map(|w| format!(r#"<div class="col-lg-3 col-md-3">{}</div>"#, w))
            .unwrap_or_default();
        format!(
            r#"<div class="sens-row cac">
                <div class="col-lg-2 col-md-2"> {} </div>
                {}
                <div class="col-lg-2 col-md-2">{}</div>
                <div class="col-lg-2 col-md-2">{}</div>
                <div class="col-lg-2 col-md-2">{}</div>
                <div class="col-lg-1 col-md-1 clear-padding">{}</div>
            </div>"#,
            date, who, deal, value, volume, price
        )
    }

    fn header_rows() -> String {
        r#"<div class="sens-row cac"><div class="col-lg-2 col-md-2">LAST TEN DEALINGS</div></div>
           <div class="sens-row cac">
             <div class="col-lg-2 col-md-2">DATE</div>
             <div class="col-lg-3 col-md-3">BENEFICIARY</div>
             <div class="col-lg-2 col-md-2">DEAL TYPE</div>
             <div class="col-lg-2 col-md-2">VALUE</div>
             <div class="col-lg-2 col-md-2">VOLUME</div>
             <div class="col-lg-1 col-md-1 clear-padding">PRICE</div>
           </div>"#
            .to_string()
    }

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body>
                <div class="sens-row cac">outside</div>
                <div id="cac-page">{}</div>
            </body></html>"#,
            rows
        )
    }

    #[test]
    fn skips_two_header_rows() {
        let html = page(&format!(
            "{}{}",
            header_rows(),
            row("01 Jan 2024", "Purchase", "10,000", "500", Some("J. Smith"), "20.00")
        ));
        let out = extractor().extract_html(&html, &Silent);
        assert_eq!(out.len(), 1);
        let d = out[0].as_ref().unwrap();
        assert_eq!(d.stock_code(), "SSW");
        assert_eq!(d.date(), "01 Jan 2024");
        assert_eq!(d.deal_type(), "Purchase");
        assert_eq!(d.beneficiary(), "J. Smith");
        assert_eq!(d.value(), 10_000);
        assert_eq!(d.volume(), 500);
        assert_eq!(d.price(), 20.0);
    }

    #[test]
    fn row_count_is_n_minus_two() {
        let data = row("d", "Sale", "1", "1", Some("x"), "1.00");
        for n in 0..6 {
            let html = page(&data.repeat(n));
            let out = extractor().extract_html(&html, &Silent);
            assert_eq!(out.len(), n.saturating_sub(2), "n = {}", n);
        }
    }

    #[test]
    fn missing_panel_yields_nothing() {
        let html = format!("<html><body>{}</body></html>", header_rows());
        assert!(extractor().extract_html(&html, &Silent).is_empty());
    }

    #[test]
    fn bad_number_fails_only_its_row() {
        let html = page(&format!(
            "{}{}{}",
            header_rows(),
            row("01 Jan 2024", "Purchase", "N/A", "500", Some("J. Smith"), "20.00"),
            row("02 Jan 2024", "Sale", "5,000", "250", Some("A. Jones"), "19.75"),
        ));
        let out = extractor().extract_html(&html, &Silent);
        assert_eq!(out.len(), 2);

        let err = out[0].as_ref().unwrap_err();
        assert_eq!(err.row, 2);
        assert_eq!(err.field, Field::Value);
        assert_eq!(err.raw, "N/A");
        assert!(matches!(err.cause, ExtractCause::InvalidCharacters));

        assert_eq!(out[1].as_ref().unwrap().value(), 5_000);
    }

    #[test]
    fn bad_price_is_reported() {
        let html = page(&format!(
            "{}{}",
            header_rows(),
            row("01 Jan 2024", "Purchase", "1", "1", Some("J. Smith"), "n/a")
        ));
        let out = extractor().extract_html(&html, &Silent);
        let err = out[0].as_ref().unwrap_err();
        assert_eq!(err.field, Field::Price);
        assert_eq!(err.raw, "n/a");
    }

    #[test]
    fn missing_beneficiary_is_empty() {
        let html = page(&format!(
            "{}{}",
            header_rows(),
            row("01 Jan 2024", "Purchase", "1,234,567", "500", None, "12.50")
        ));
        let out = extractor().extract_html(&html, &Silent);
        let d = out[0].as_ref().unwrap();
        assert_eq!(d.beneficiary(), "");
        assert_eq!(d.value(), 1_234_567);
        assert_eq!(d.price(), 12.5);
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(usize, Vec<Field>)>>);

    impl PipelineObserver for Recorder {
        fn on_missing_columns(&self, row: usize, fields: &[Field]) {
            self.0.borrow_mut().push((row, fields.to_vec()));
        }
    }

    fn short_row() -> String {
        r#"<div class="sens-row cac">
             <div class="col-lg-2 col-md-2">03 Jan 2024</div>
             <div class="col-lg-2 col-md-2">Sale</div>
             <div class="col-lg-1 col-md-1 clear-padding">1.00</div>
           </div>"#
            .to_string()
    }

    #[test]
    fn short_row_leaves_fields_unset_and_reports() {
        let html = page(&format!("{}{}", header_rows(), short_row()));
        let recorder = Recorder::default();
        let out = extractor().extract_html(&html, &recorder);
        let d = out[0].as_ref().unwrap();
        assert_eq!(d.deal_type(), "Sale");
        assert_eq!(d.value(), 0);
        assert_eq!(d.volume(), 0);
        assert_eq!(
            recorder.0.borrow().as_slice(),
            &[(2, vec![Field::Value, Field::Volume])]
        );
    }

    #[test]
    fn strict_columns_rejects_short_row() {
        let settings = ExtractorSettings {
            strict_columns: true,
            ..Default::default()
        };
        let ex = Extractor::new(&settings, "SSW").unwrap();
        let html = page(&format!("{}{}", header_rows(), short_row()));
        let out = ex.extract_html(&html, &Silent);
        let err = out[0].as_ref().unwrap_err();
        assert_eq!(err.field, Field::Value);
        assert!(matches!(err.cause, ExtractCause::MissingCell { position: 2 }));
    }

    #[test]
    fn extra_cells_are_ignored() {
        let extra = r#"<div class="sens-row cac">
             <div class="col-lg-2 col-md-2">d</div>
             <div class="col-lg-2 col-md-2">Sale</div>
             <div class="col-lg-2 col-md-2">7</div>
             <div class="col-lg-2 col-md-2">8</div>
             <div class="col-lg-2 col-md-2">not a number</div>
             <div class="col-lg-1 col-md-1 clear-padding">1.5</div>
           </div>"#;
        let html = page(&format!("{}{}", header_rows(), extra));
        let out = extractor().extract_html(&html, &Silent);
        let d = out[0].as_ref().unwrap();
        assert_eq!((d.value(), d.volume()), (7, 8));
    }

    #[test]
    fn custom_column_order() {
        let settings = ExtractorSettings {
            columns: vec!["deal_type".into(), "date".into(), "volume".into(), "value".into()],
            ..Default::default()
        };
        let ex = Extractor::new(&settings, "SSW").unwrap();
        let html = page(&format!(
            "{}{}",
            header_rows(),
            row("Purchase", "01 Jan 2024", "10", "20", Some("x"), "1.00")
        ));
        let out = ex.extract_html(&html, &Silent);
        let d = out[0].as_ref().unwrap();
        assert_eq!(d.deal_type(), "Purchase");
        assert_eq!(d.date(), "01 Jan 2024");
        assert_eq!(d.volume(), 10);
        assert_eq!(d.value(), 20);
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let settings = ExtractorSettings {
            row: "div[".into(),
            ..Default::default()
        };
        let err = Extractor::new(&settings, "SSW").unwrap_err();
        assert!(matches!(err, ConfigError::Selector { name: "row", .. }));
    }

    #[test]
    fn extraction_is_repeatable() {
        let html = page(&format!(
            "{}{}",
            header_rows(),
            row("01 Jan 2024", "Purchase", "10,000", "500", Some("J. Smith"), "20.00")
        ));
        let doc = Html::parse_document(&html);
        let ex = extractor();
        let first: Vec<_> = ex.extract(&doc, &Silent).map(|r| r.unwrap()).collect();
        let second: Vec<_> = ex.extract(&doc, &Silent).map(|r| r.unwrap()).collect();
        assert_eq!(first, second);
    }
}
