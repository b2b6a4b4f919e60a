// UI layer: the interactive page. `View` holds the current mode and handles
// one event per user action; `main_menu` is the terminal loop that prompts
// with `dialoguer` and feeds those events in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::api::{DeploymentFeature, Predictor};
use crate::error::ApiError;
use crate::render::{render_block, Block, Page};
use crate::table::{FeatureRow, InputTable, FEATURE_IMPACTS_COLUMN, PREDICTION_COLUMN};

pub const TITLE: &str = "DataRobot Interactive Prediction Demo";
pub const INTRO: &str =
    "Upload a CSV of your features or enter values manually to see predictions from your deployed model.";
pub const FOOTER: &str = "Predictions are served by the configured deployment; nothing is stored locally.";

/// Used for manual entry when neither flags nor the deployment name any
/// features.
pub const PLACEHOLDER_FEATURES: [&str; 3] = ["feature1", "feature2", "feature3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    UploadCsv,
    ManualEntry,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::UploadCsv => "Upload CSV",
            Mode::ManualEntry => "Manual Entry",
        }
    }
}

/// User actions the view reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ModeChanged(Mode),
    FileSelected(PathBuf),
    /// Current text input values, in feature-name order.
    SubmitPressed(Vec<String>),
}

#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub preview_rows: usize,
    pub show_progress: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        ViewOptions {
            preview_rows: 5,
            show_progress: true,
        }
    }
}

#[derive(Debug, Default)]
struct UploadState {
    file: Option<PathBuf>,
    page: Page,
}

#[derive(Debug, Default)]
struct ManualState {
    values: Vec<String>,
    page: Page,
}

#[derive(Debug)]
enum ModeState {
    Upload(UploadState),
    Manual(ManualState),
}

impl ModeState {
    fn fresh(mode: Mode) -> Self {
        match mode {
            Mode::UploadCsv => ModeState::Upload(UploadState::default()),
            Mode::ManualEntry => ModeState::Manual(ManualState::default()),
        }
    }
}

/// Collects one interaction's page while forwarding each block to a sink.
struct Emitter<'s> {
    page: Page,
    sink: &'s mut dyn FnMut(&Block),
}

impl<'s> Emitter<'s> {
    fn new(sink: &'s mut dyn FnMut(&Block)) -> Self {
        Emitter {
            page: Page::new(),
            sink,
        }
    }

    fn push(&mut self, block: Block) {
        (self.sink)(&block);
        self.page.push(block);
    }
}

/// The page's state machine. Each mode owns its own state; changing mode
/// drops it.
pub struct View<'a, P: Predictor + ?Sized> {
    predictor: &'a P,
    feature_names: Vec<String>,
    options: ViewOptions,
    state: ModeState,
}

impl<'a, P: Predictor + ?Sized> View<'a, P> {
    /// Starts in upload mode, the first option of the selector.
    pub fn new(predictor: &'a P, feature_names: Vec<String>, options: ViewOptions) -> Self {
        View {
            predictor,
            feature_names,
            options,
            state: ModeState::fresh(Mode::UploadCsv),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.state {
            ModeState::Upload(_) => Mode::UploadCsv,
            ModeState::Manual(_) => Mode::ManualEntry,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Blocks produced by the last interaction in the current mode.
    pub fn page(&self) -> &Page {
        match &self.state {
            ModeState::Upload(s) => &s.page,
            ModeState::Manual(s) => &s.page,
        }
    }

    pub fn uploaded_file(&self) -> Option<&Path> {
        match &self.state {
            ModeState::Upload(s) => s.file.as_deref(),
            ModeState::Manual(_) => None,
        }
    }

    pub fn manual_values(&self) -> &[String] {
        match &self.state {
            ModeState::Manual(s) => &s.values,
            ModeState::Upload(_) => &[],
        }
    }

    pub fn dispatch(&mut self, event: Event) -> &Page {
        self.dispatch_with(event, &mut |_| {})
    }

    /// Like `dispatch`, but hands each block to `sink` as soon as it is
    /// produced, so the preview shows while the request is still running.
    pub fn dispatch_with(&mut self, event: Event, sink: &mut dyn FnMut(&Block)) -> &Page {
        match event {
            Event::ModeChanged(mode) => {
                if mode != self.mode() {
                    debug!(mode = mode.label(), "mode changed");
                    self.state = ModeState::fresh(mode);
                }
            }
            Event::FileSelected(path) => {
                if self.mode() != Mode::UploadCsv {
                    warn!("file selected outside upload mode, ignoring");
                } else {
                    let mut out = Emitter::new(sink);
                    if let Err(err) = self.run_upload(&path, &mut out) {
                        out.push(Block::Error(format!("{err:#}")));
                    }
                    self.state = ModeState::Upload(UploadState {
                        file: Some(path),
                        page: out.page,
                    });
                }
            }
            Event::SubmitPressed(values) => {
                if self.mode() != Mode::ManualEntry {
                    warn!("submit pressed outside manual mode, ignoring");
                } else {
                    let mut out = Emitter::new(sink);
                    if let Err(err) = self.run_manual(&values, &mut out) {
                        out.push(Block::Error(format!("{err:#}")));
                    }
                    self.state = ModeState::Manual(ManualState {
                        values,
                        page: out.page,
                    });
                }
            }
        }
        self.page()
    }

    /// Parse, preview, predict. There is no confirmation between the preview
    /// and the request.
    fn run_upload(&self, path: &Path, out: &mut Emitter<'_>) -> Result<()> {
        let input = InputTable::from_path(path)
            .with_context(|| format!("could not load {}", path.display()))?;
        out.push(Block::Subheader("Input Data Preview".into()));
        out.push(Block::table(&input.head(self.options.preview_rows)));

        let rows = input.feature_rows();
        let predictions = self
            .with_spinner("Requesting predictions...", || self.predictor.predict(&rows))
            .context("prediction request failed")?;

        out.push(Block::Subheader("Predictions".into()));
        out.push(Block::table(&predictions));

        if predictions.has_column(FEATURE_IMPACTS_COLUMN) {
            out.push(Block::Subheader("Feature Impacts".into()));
            out.push(Block::table(
                &predictions.select(&[PREDICTION_COLUMN, FEATURE_IMPACTS_COLUMN]),
            ));
        }
        Ok(())
    }

    /// Inputs beyond the known features are dropped; missing ones are sent
    /// as empty strings.
    fn run_manual(&self, values: &[String], out: &mut Emitter<'_>) -> Result<()> {
        let row = FeatureRow::from_text_inputs(self.feature_names.iter().enumerate().map(
            |(i, name)| (name.as_str(), values.get(i).map(String::as_str).unwrap_or("")),
        ));
        let result = self
            .with_spinner("Generating prediction...", || {
                self.predictor.predict(std::slice::from_ref(&row))
            })
            .context("prediction request failed")?;
        out.push(Block::Subheader("Prediction Result".into()));
        out.push(Block::table(&result));
        Ok(())
    }

    fn with_spinner<T>(&self, msg: &'static str, f: impl FnOnce() -> T) -> T {
        let spinner = if self.options.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(msg);
        spinner.enable_steady_tick(Duration::from_millis(100));
        let out = f();
        spinner.finish_and_clear();
        out
    }
}

/// Pick the manual-entry features: explicit names first, then the
/// deployment's declared schema, then the placeholders.
pub fn manual_feature_names(
    explicit: &[String],
    declared: impl FnOnce() -> Result<Vec<DeploymentFeature>, ApiError>,
) -> Vec<String> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    match declared() {
        Ok(features) if !features.is_empty() => features.into_iter().map(|f| f.name).collect(),
        Ok(_) => {
            warn!("deployment declares no features, using placeholder names");
            placeholder_features()
        }
        Err(err) => {
            warn!(error = %err, "could not fetch deployment features, using placeholder names");
            placeholder_features()
        }
    }
}

fn placeholder_features() -> Vec<String> {
    PLACEHOLDER_FEATURES.iter().map(|s| s.to_string()).collect()
}

/// How the upload mode asks for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePicker {
    Prompt,
    Native,
}

pub fn native_dialog_available() -> bool {
    cfg!(feature = "native-dialog")
}

/// Main interactive loop. Receives the resolved deployment (or anything that
/// predicts) and runs until the user chooses "Quit".
pub fn main_menu<P: Predictor + ?Sized>(
    predictor: &P,
    feature_names: Vec<String>,
    options: ViewOptions,
    picker: FilePicker,
) -> Result<()> {
    println!("{}", render_block(&Block::Title(TITLE.into()), true));
    println!("{}", render_block(&Block::Markdown(INTRO.into()), true));

    let mut view = View::new(predictor, feature_names, options);
    loop {
        let items = [Mode::UploadCsv.label(), Mode::ManualEntry.label(), "Quit"];
        let current = match view.mode() {
            Mode::UploadCsv => 0,
            Mode::ManualEntry => 1,
        };
        let selection = Select::new()
            .with_prompt("Choose input mode:")
            .items(&items)
            .default(current)
            .interact()?;
        let mode = match selection {
            0 => Mode::UploadCsv,
            1 => Mode::ManualEntry,
            _ => break,
        };
        view.dispatch(Event::ModeChanged(mode));

        let event = match mode {
            Mode::UploadCsv => prompt_file(picker)?.map(Event::FileSelected),
            Mode::ManualEntry => prompt_manual(view.feature_names())?,
        };
        if let Some(event) = event {
            view.dispatch_with(event, &mut |block| println!("{}", render_block(block, true)));
        }

        println!("{}", render_block(&Block::Divider, true));
        println!("{}", render_block(&Block::Caption(FOOTER.into()), true));
    }
    Ok(())
}

/// Ask for the CSV to upload. `None` means the user went back.
fn prompt_file(picker: FilePicker) -> Result<Option<PathBuf>> {
    if picker == FilePicker::Native {
        return Ok(pick_native());
    }
    let path: String = Input::new()
        .with_prompt("Upload CSV (path, empty to go back)")
        .allow_empty(true)
        .interact_text()?;
    let path = path.trim();
    Ok((!path.is_empty()).then(|| PathBuf::from(path)))
}

#[cfg(feature = "native-dialog")]
fn pick_native() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Upload CSV")
        .add_filter("CSV", &["csv"])
        .pick_file()
}

#[cfg(not(feature = "native-dialog"))]
fn pick_native() -> Option<PathBuf> {
    None
}

/// One text input per feature, then the Predict button.
fn prompt_manual(feature_names: &[String]) -> Result<Option<Event>> {
    println!("{}", render_block(&Block::Subheader("Manual Entry of Feature Values".into()), true));
    let mut values = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let value: String = Input::new()
            .with_prompt(name.as_str())
            .allow_empty(true)
            .interact_text()?;
        values.push(value);
    }
    let submit = Confirm::new().with_prompt("Predict?").default(true).interact()?;
    Ok(submit.then(|| Event::SubmitPressed(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PredictionTable;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::io::Write;

    /// Answers one prediction per row, or rejects rows whose columns don't
    /// match the expected features.
    struct FakePredictor {
        expected: Vec<&'static str>,
        impacts: bool,
        calls: RefCell<Vec<Vec<FeatureRow>>>,
    }

    impl FakePredictor {
        fn new(expected: &[&'static str]) -> Self {
            FakePredictor {
                expected: expected.to_vec(),
                impacts: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn with_impacts(mut self) -> Self {
            self.impacts = true;
            self
        }
    }

    impl Predictor for FakePredictor {
        fn predict(&self, rows: &[FeatureRow]) -> Result<PredictionTable, ApiError> {
            self.calls.borrow_mut().push(rows.to_vec());
            for row in rows {
                let names: Vec<&str> = row.names().collect();
                if names != self.expected {
                    return Err(ApiError::Status {
                        status: StatusCode::UNPROCESSABLE_ENTITY,
                        url: "fake".into(),
                        body: "columns do not match model features".into(),
                    });
                }
            }
            let records = (0..rows.len())
                .map(|i| {
                    let mut v = json!({"rowId": i, "prediction": 0.5});
                    if self.impacts {
                        v["predictionFeatureImpacts"] = json!([{"featureName": "a", "impact": 0.2}]);
                    }
                    match v {
                        Value::Object(m) => m,
                        _ => unreachable!(),
                    }
                })
                .collect();
            Ok(PredictionTable::from_records(records))
        }
    }

    fn options() -> ViewOptions {
        ViewOptions {
            preview_rows: 5,
            show_progress: false,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    const SEVEN_ROWS: &str = "a,b\n1,x\n2,y\n3,z\n4,w\n5,v\n6,u\n7,t\n";

    #[test]
    fn upload_predicts_one_row_per_input_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ok.csv", SEVEN_ROWS);
        let fake = FakePredictor::new(&["a", "b"]);
        let mut view = View::new(&fake, names(&["a", "b"]), options());

        let page = view.dispatch(Event::FileSelected(path));
        assert_eq!(page.error(), None);
        assert_eq!(page.subheaders(), ["Input Data Preview", "Predictions"]);
        let tables = page.tables();
        assert_eq!(tables[0].rows.len(), 5, "preview shows the head only");
        assert_eq!(tables[1].rows.len(), 7);
        assert_eq!(fake.calls.borrow().len(), 1, "one request for the whole file");
    }

    /// Records how many blocks had reached the sink when the request went out.
    struct CountingPredictor {
        emitted: Rc<Cell<usize>>,
        seen_at_request: Cell<Option<usize>>,
    }

    impl Predictor for CountingPredictor {
        fn predict(&self, rows: &[FeatureRow]) -> Result<PredictionTable, ApiError> {
            self.seen_at_request.set(Some(self.emitted.get()));
            let records = rows
                .iter()
                .map(|_| match json!({"prediction": 1}) {
                    Value::Object(m) => m,
                    _ => unreachable!(),
                })
                .collect();
            Ok(PredictionTable::from_records(records))
        }
    }

    #[test]
    fn preview_reaches_sink_before_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ok.csv", "a\n1\n2\n");
        let emitted = Rc::new(Cell::new(0));
        let predictor = CountingPredictor {
            emitted: Rc::clone(&emitted),
            seen_at_request: Cell::new(None),
        };
        let mut view = View::new(&predictor, vec![], options());

        let mut streamed = Vec::new();
        let page = view.dispatch_with(Event::FileSelected(path), &mut |block| {
            emitted.set(emitted.get() + 1);
            streamed.push(block.clone());
        });
        assert_eq!(page.tables().len(), 2);
        assert_eq!(predictor.seen_at_request.get(), Some(2), "subheader and preview first");
        assert_eq!(streamed.len(), 4);
        assert_eq!(streamed[0], Block::Subheader("Input Data Preview".into()));
    }

    #[test]
    fn upload_shows_impacts_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ok.csv", "a,b\n1,x\n");
        let fake = FakePredictor::new(&["a", "b"]).with_impacts();
        let mut view = View::new(&fake, vec![], options());

        let page = view.dispatch(Event::FileSelected(path));
        assert_eq!(page.subheaders().last(), Some(&"Feature Impacts"));
        let impacts = page.tables()[2];
        assert_eq!(impacts.columns, ["prediction", "predictionFeatureImpacts"]);
    }

    #[test]
    fn mismatched_columns_render_error_and_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "bad.csv", "wrong,cols\n1,2\n");
        let fake = FakePredictor::new(&["a", "b"]);
        let mut view = View::new(&fake, vec![], options());

        let page = view.dispatch(Event::FileSelected(path));
        assert!(page.error().unwrap().contains("columns do not match"));
        assert_eq!(page.subheaders(), ["Input Data Preview"]);
        assert_eq!(page.tables().len(), 1, "preview stays, no predictions table");
    }

    #[test]
    fn malformed_csv_stops_before_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ragged.csv", "a,b\n1\n");
        let fake = FakePredictor::new(&["a", "b"]);
        let mut view = View::new(&fake, vec![], options());

        let page = view.dispatch(Event::FileSelected(path));
        assert!(page.error().is_some());
        assert!(page.tables().is_empty());
        assert!(fake.calls.borrow().is_empty());
    }

    #[test]
    fn manual_submit_yields_single_row() {
        let fake = FakePredictor::new(&PLACEHOLDER_FEATURES);
        let mut view = View::new(&fake, placeholder_features(), options());
        view.dispatch(Event::ModeChanged(Mode::ManualEntry));

        let page = view.dispatch(Event::SubmitPressed(names(&["1", "2", "3"])));
        assert_eq!(page.error(), None);
        assert_eq!(page.subheaders(), ["Prediction Result"]);
        assert_eq!(page.tables()[0].rows.len(), 1);
        assert_eq!(view.manual_values(), ["1", "2", "3"]);
    }

    #[test]
    fn manual_submit_with_empty_fields_still_requests() {
        let fake = FakePredictor::new(&PLACEHOLDER_FEATURES);
        let mut view = View::new(&fake, placeholder_features(), options());
        view.dispatch(Event::ModeChanged(Mode::ManualEntry));

        view.dispatch(Event::SubmitPressed(vec![]));
        let calls = fake.calls.borrow();
        assert_eq!(calls.len(), 1);
        let row = &calls[0][0];
        assert_eq!(row.len(), 3);
        assert_eq!(
            row.get("feature2"),
            Some(&crate::table::FeatureValue::Text(String::new()))
        );
    }

    #[test]
    fn switching_mode_discards_upload_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ok.csv", "a,b\n1,x\n");
        let fake = FakePredictor::new(&["a", "b"]);
        let mut view = View::new(&fake, names(&["a", "b"]), options());

        view.dispatch(Event::FileSelected(path));
        assert!(view.uploaded_file().is_some());

        let page = view.dispatch(Event::ModeChanged(Mode::ManualEntry));
        assert!(page.is_empty());
        view.dispatch(Event::ModeChanged(Mode::UploadCsv));
        assert!(view.uploaded_file().is_none());
        assert!(view.page().is_empty());
    }

    #[test]
    fn switching_mode_discards_manual_state() {
        let fake = FakePredictor::new(&["a"]);
        let mut view = View::new(&fake, names(&["a"]), options());
        view.dispatch(Event::ModeChanged(Mode::ManualEntry));
        view.dispatch(Event::SubmitPressed(names(&["1"])));
        assert!(!view.page().is_empty());

        view.dispatch(Event::ModeChanged(Mode::UploadCsv));
        view.dispatch(Event::ModeChanged(Mode::ManualEntry));
        assert!(view.page().is_empty());
        assert!(view.manual_values().is_empty());
    }

    #[test]
    fn reselecting_same_mode_keeps_state() {
        let fake = FakePredictor::new(&["a"]);
        let mut view = View::new(&fake, names(&["a"]), options());
        view.dispatch(Event::ModeChanged(Mode::ManualEntry));
        view.dispatch(Event::SubmitPressed(names(&["1"])));
        view.dispatch(Event::ModeChanged(Mode::ManualEntry));
        assert_eq!(view.page().tables().len(), 1);
    }

    #[test]
    fn events_for_other_mode_are_ignored() {
        let fake = FakePredictor::new(&["a"]);
        let mut view = View::new(&fake, names(&["a"]), options());
        view.dispatch(Event::SubmitPressed(names(&["1"])));
        assert!(fake.calls.borrow().is_empty());
        assert_eq!(view.mode(), Mode::UploadCsv);
    }

    #[test]
    fn explicit_feature_names_win() {
        let picked = manual_feature_names(&names(&["x"]), || panic!("schema not needed"));
        assert_eq!(picked, ["x"]);
    }

    #[test]
    fn declared_features_are_used() {
        let picked = manual_feature_names(&[], || {
            Ok(vec![DeploymentFeature {
                name: "distance".into(),
                feature_type: Some("Numeric".into()),
                importance: Some(1.0),
            }])
        });
        assert_eq!(picked, ["distance"]);
    }

    #[test]
    fn schema_failure_falls_back_to_placeholders() {
        let picked = manual_feature_names(&[], || {
            Err(ApiError::Status {
                status: StatusCode::NOT_FOUND,
                url: "x".into(),
                body: String::new(),
            })
        });
        assert_eq!(picked, PLACEHOLDER_FEATURES);
    }
}
