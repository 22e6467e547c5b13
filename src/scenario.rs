//! Scenarios and the registry that orders them.
//!
//! A [`Playbook`] is an explicit value: build one, then pass it to the
//! pipeline entry points (`SnapshotExport::run`, `LoadQueue::pre_render`).

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::error::Result;
use crate::rendering::{Content, RenderContext, View};

/// Sizing strategy for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Shrink to the content's ideal size.
    Compressed,
    /// Expand to the container.
    Fill,
    /// A fixed length, clamped to the container when it does not fit.
    Fixed(f64),
}

/// How a scenario's content is laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioLayout {
    pub h: Sizing,
    pub v: Sizing,
}

impl ScenarioLayout {
    pub const fn sizing(h: Sizing, v: Sizing) -> Self {
        Self { h, v }
    }

    pub const fn compressed() -> Self {
        Self::sizing(Sizing::Compressed, Sizing::Compressed)
    }

    pub const fn fill() -> Self {
        Self::sizing(Sizing::Fill, Sizing::Fill)
    }

    /// Fill horizontally, compress vertically.
    pub const fn fill_h() -> Self {
        Self::sizing(Sizing::Fill, Sizing::Compressed)
    }

    /// Fill vertically, compress horizontally.
    pub const fn fill_v() -> Self {
        Self::sizing(Sizing::Compressed, Sizing::Fill)
    }

    pub const fn fixed(width: f64, height: f64) -> Self {
        Self::sizing(Sizing::Fixed(width), Sizing::Fixed(height))
    }

    pub const fn fixed_length(length: f64) -> Self {
        Self::fixed(length, length)
    }

    pub const fn fixed_h(width: f64) -> Self {
        Self::sizing(Sizing::Fixed(width), Sizing::Compressed)
    }

    pub const fn fixed_v(height: f64) -> Self {
        Self::sizing(Sizing::Compressed, Sizing::Fixed(height))
    }
}

struct ScenarioInner {
    name: String,
    layout: ScenarioLayout,
    location: &'static Location<'static>,
    content: Box<dyn Content>,
}

/// A named, reproducible unit of content plus its layout intent.
///
/// Cheap to clone; clones share the same content producer.
#[derive(Clone)]
pub struct Scenario {
    inner: Arc<ScenarioInner>,
}

impl Scenario {
    /// Create a scenario. The caller's source location is recorded for
    /// diagnostics.
    #[track_caller]
    pub fn new<C>(name: impl Into<String>, layout: ScenarioLayout, content: C) -> Self
    where
        C: Content + 'static,
    {
        Self {
            inner: Arc::new(ScenarioInner {
                name: name.into(),
                layout,
                location: Location::caller(),
                content: Box::new(content),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn layout(&self) -> ScenarioLayout {
        self.inner.layout
    }

    pub fn file(&self) -> &'static str {
        self.inner.location.file()
    }

    pub fn line(&self) -> u32 {
        self.inner.location.line()
    }

    pub fn render(&self, context: &RenderContext) -> View {
        self.inner.content.render(context)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.inner.name)
            .field("layout", &self.inner.layout)
            .field("file", &self.file())
            .field("line", &self.line())
            .finish()
    }
}

/// Scenarios of one category, in insertion order.
#[derive(Debug, Clone)]
pub struct ScenarioStore {
    category: String,
    scenarios: Vec<Scenario>,
    index: HashMap<String, usize>,
}

impl ScenarioStore {
    pub fn new(category: impl Into<String>) -> Self {
        Self { category: category.into(), scenarios: Vec::new(), index: HashMap::new() }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.index.get(name).map(|&i| &self.scenarios[i])
    }

    /// Add a scenario; one with the same name is replaced in place.
    pub fn add(&mut self, scenario: Scenario) -> &mut Self {
        match self.index.get(scenario.name()) {
            Some(&i) => self.scenarios[i] = scenario,
            None => {
                self.index.insert(scenario.name().to_string(), self.scenarios.len());
                self.scenarios.push(scenario);
            }
        }
        self
    }
}

/// The scenario registry.
#[derive(Debug, Clone, Default)]
pub struct Playbook {
    stores: Vec<ScenarioStore>,
}

impl Playbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> &[ScenarioStore] {
        &self.stores
    }

    /// The store for `category`, created on first use.
    pub fn scenarios_of(&mut self, category: &str) -> &mut ScenarioStore {
        let i = match self.stores.iter().position(|s| s.category == category) {
            Some(i) => i,
            None => {
                self.stores.push(ScenarioStore::new(category));
                self.stores.len() - 1
            }
        };
        &mut self.stores[i]
    }

    pub fn add_scenarios<I>(&mut self, category: &str, scenarios: I) -> &mut Self
    where
        I: IntoIterator<Item = Scenario>,
    {
        let store = self.scenarios_of(category);
        for scenario in scenarios {
            store.add(scenario);
        }
        self
    }

    /// Every (category, scenario) pair in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scenario)> + '_ {
        self.stores
            .iter()
            .flat_map(|store| store.scenarios.iter().map(move |s| (store.category(), s)))
    }

    pub fn len(&self) -> usize {
        self.stores.iter().map(|s| s.scenarios.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run each tool against this playbook in order, stopping at the first
    /// failure.
    pub fn run(&self, tools: &[&dyn TestTool]) -> Result<()> {
        for tool in tools {
            tool.run(self)?;
        }
        Ok(())
    }
}

/// A tool that tests or exports the scenarios of a [`Playbook`].
pub trait TestTool {
    fn run(&self, playbook: &Playbook) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::Rgba;

    fn square(name: &str) -> Scenario {
        Scenario::new(name, ScenarioLayout::compressed(), |_: &RenderContext| {
            View::rect(10.0, 10.0, Rgba::BLACK)
        })
    }

    #[test]
    fn preserves_insertion_order_across_categories() {
        let mut pb = Playbook::new();
        pb.add_scenarios("Buttons", [square("Primary"), square("Secondary")]);
        pb.add_scenarios("Cards", [square("Plain")]);
        pb.add_scenarios("Buttons", [square("Tertiary")]);

        let names: Vec<(&str, &str)> = pb.iter().map(|(c, s)| (c, s.name())).collect();
        assert_eq!(
            names,
            vec![("Buttons", "Primary"), ("Buttons", "Secondary"), ("Buttons", "Tertiary"), ("Cards", "Plain")]
        );
        assert_eq!(pb.len(), 4);
    }

    #[test]
    fn duplicate_name_replaces_in_place() {
        let mut store = ScenarioStore::new("Buttons");
        store.add(square("A")).add(square("B"));
        let replacement = Scenario::new("A", ScenarioLayout::fill(), |_: &RenderContext| View::Empty);
        store.add(replacement);
        assert_eq!(store.scenarios().len(), 2);
        assert_eq!(store.scenarios()[0].layout(), ScenarioLayout::fill());
        assert!(store.get("B").is_some());
    }

    struct Counting(std::cell::Cell<usize>);

    impl TestTool for Counting {
        fn run(&self, playbook: &Playbook) -> Result<()> {
            self.0.set(self.0.get() + playbook.len());
            Ok(())
        }
    }

    struct Failing;

    impl TestTool for Failing {
        fn run(&self, _: &Playbook) -> Result<()> {
            Err(crate::Error::Other("boom".to_string()))
        }
    }

    #[test]
    fn run_stops_at_first_failing_tool() {
        let mut pb = Playbook::new();
        pb.add_scenarios("Buttons", [square("A"), square("B")]);
        let before = Counting(Default::default());
        let after = Counting(Default::default());
        assert!(pb.run(&[&before, &Failing, &after]).is_err());
        assert_eq!(before.0.get(), 2);
        assert_eq!(after.0.get(), 0);
    }

    #[test]
    fn records_source_location() {
        let s = square("Located");
        assert!(s.file().ends_with("scenario.rs"));
        assert!(s.line() > 0);
    }
}
