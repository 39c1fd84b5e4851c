use crate::category::{Category, CategoryRegistry, NameRequirement};
use crate::ignore::{IgnoreMode, IgnorePolicy};
use crate::rules::{Condition, RuleNode};
use crate::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

pub struct PoiConfig {
    registry: CategoryRegistry,
    root: RuleNode,
    ignore: IgnorePolicy,
}

impl PoiConfig {
    pub fn new(mode: IgnoreMode) -> Self {
        Self {
            registry: CategoryRegistry::new(),
            root: RuleNode::root(),
            ignore: IgnorePolicy::new(mode),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("cannot read config {}: {err}", path.display()))?;
        Self::from_xml_str(&text)
    }

    pub fn from_xml_str(text: &str) -> Result<Self> {
        Self::from_xml(Reader::from_reader(text.as_bytes()))
    }

    fn from_xml<R: BufRead>(mut reader: Reader<R>) -> Result<Self> {
        reader.trim_text(true);

        let mut builder = Builder::new();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) => builder.open(&e, false)?,
                Event::Empty(e) => builder.open(&e, true)?,
                Event::End(e) => match e.name().as_ref() {
                    b"filter" => builder.close_filter()?,
                    b"map" => builder.map_key = None,
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }
        builder.finish()
    }

    pub fn register(&mut self, category: Category) -> Arc<Category> {
        self.registry.register(category)
    }

    #[cfg(test)]
    pub(crate) fn map_root(&mut self, key: &str, value: &str, category: Category) -> Arc<Category> {
        let category = self.registry.register(category);
        self.root.add_mapping(key, value, Arc::clone(&category));
        category
    }

    #[cfg(test)]
    pub(crate) fn add_root_child(&mut self, child: RuleNode) {
        self.root.add_child(child);
    }

    pub fn ignore_mut(&mut self) -> &mut IgnorePolicy {
        &mut self.ignore
    }

    pub fn set_ignore_mode(&mut self, mode: IgnoreMode) {
        self.ignore.set_mode(mode);
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn root(&self) -> &RuleNode {
        &self.root
    }

    pub fn into_parts(self) -> (CategoryRegistry, RuleNode, IgnorePolicy) {
        (self.registry, self.root, self.ignore)
    }
}

struct Builder {
    config: PoiConfig,
    stack: Vec<RuleNode>,
    map_key: Option<String>,
}

impl Builder {
    fn new() -> Self {
        Self {
            config: PoiConfig::new(IgnoreMode::default()),
            stack: vec![RuleNode::root()],
            map_key: None,
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<()> {
        match e.name().as_ref() {
            b"config" => {
                if let Some(mode) = attr_value(e, b"ignore-mode")? {
                    let mode = IgnoreMode::parse(&mode)
                        .ok_or_else(|| format!("unknown ignore-mode: {mode}"))?;
                    self.config.set_ignore_mode(mode);
                }
            }
            b"filter" => {
                let key = attr_value(e, b"key")?;
                let value = attr_value(e, b"value")?;
                self.stack.push(RuleNode::new(Condition::new(key, value)));
                if empty {
                    self.close_filter()?;
                }
            }
            b"map" => {
                let key = attr_value(e, b"key")?.ok_or("map without key")?;
                self.map_key = if empty { None } else { Some(key) };
            }
            b"class" => self.add_class(e)?,
            b"classes" => self.add_classes(e)?,
            b"ignore" => self.add_ignore(e)?,
            _ => {}
        }
        Ok(())
    }

    fn close_filter(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err("unbalanced filter element".into());
        }
        if let Some(node) = self.stack.pop() {
            if let Some(parent) = self.stack.last_mut() {
                parent.add_child(node);
            }
        }
        Ok(())
    }

    fn current_key(&self, element: &str) -> Result<String> {
        self.map_key
            .clone()
            .ok_or_else(|| format!("{element} outside of a map").into())
    }

    fn add_class(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let key = self.current_key("class")?;
        let value = attr_value(e, b"value")?.ok_or("class without value")?;
        let identifier = attr_value(e, b"cat")?.unwrap_or_else(|| value.clone());
        let requirement = name_requirement(e)?;
        let names = attr_value(e, b"names")?.map(|names| {
            names
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
        });
        let force_single = has_attr(e, b"forcesingle")?;

        let category = Category::new(identifier, requirement, names, force_single);
        self.map(&key, &value, category);
        Ok(())
    }

    fn add_classes(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let key = self.current_key("classes")?;
        let values = attr_value(e, b"values")?.ok_or("classes without values")?;
        let identifier = attr_value(e, b"cat")?;
        let requirement = name_requirement(e)?;
        let force_single = has_attr(e, b"forcesingle")?;

        for value in values.split(',').map(|value| value.trim()) {
            if value.is_empty() {
                continue;
            }
            let identifier = identifier.clone().unwrap_or_else(|| value.to_string());
            let category = Category::new(identifier, requirement, None, force_single);
            self.map(&key, value, category);
        }
        Ok(())
    }

    fn map(&mut self, key: &str, value: &str, category: Category) {
        let category = self.config.register(category);
        if let Some(node) = self.stack.last_mut() {
            node.add_mapping(key, value, category);
        }
    }

    fn add_ignore(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let key = attr_value(e, b"key")?.ok_or("ignore without key")?;
        if let Some(value) = attr_value(e, b"value")? {
            let nocase = has_attr(e, b"nocase")?;
            self.config.ignore_mut().add_value(&key, &value, nocase);
        } else if let Some(pattern) = attr_value(e, b"pattern")? {
            self.config.ignore_mut().add_pattern(&key, &pattern)?;
        } else {
            return Err(format!("ignore rule for {key} needs a value or a pattern").into());
        }
        Ok(())
    }

    fn finish(mut self) -> Result<PoiConfig> {
        if self.stack.len() != 1 {
            return Err("unclosed filter element".into());
        }
        if let Some(root) = self.stack.pop() {
            self.config.root = root;
        }
        Ok(self.config)
    }
}

fn name_requirement(e: &BytesStart<'_>) -> Result<NameRequirement> {
    match attr_value(e, b"name")? {
        Some(value) => NameRequirement::parse(&value)
            .ok_or_else(|| format!("unknown name requirement: {value}").into()),
        None => Ok(NameRequirement::Optional),
    }
}

fn has_attr(e: &BytesStart<'_>, key: &[u8]) -> Result<bool> {
    Ok(attr_value(e, key)?.is_some())
}

pub(crate) fn attr_value(event: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::tags::tags_from_pairs;

    const SAMPLE: &str = include_str!("../config/pois.xml");

    #[test]
    fn sample_config_loads() {
        let config = PoiConfig::from_xml_str(SAMPLE).unwrap();
        let restaurant = config.registry().get("restaurant").unwrap();
        assert_eq!(restaurant.name_requirement(), NameRequirement::Optional);
        let post_box = config.registry().get("post-box").unwrap();
        assert!(post_box.is_force_single());
        assert!(!post_box.uses_name());
        assert!(config.registry().get("other").is_some());
        assert!(!config.root().children().is_empty());
    }

    #[test]
    fn nested_filters_and_classes() {
        let config = PoiConfig::from_xml_str(
            r#"<config>
  <filter key="railway" value="station">
    <map key="station">
      <classes values="subway,light_rail" cat="rapid-transit" />
    </map>
    <filter key="operator">
      <map key="operator"><class value="BVG" cat="bvg" name="required" names="name,ref" /></map>
    </filter>
  </filter>
  <filter key="disused" />
</config>"#,
        )
        .unwrap();
        assert_eq!(config.root().children().len(), 2);
        assert_eq!(config.root().children()[0].children().len(), 1);
        assert_eq!(
            config.root().children()[1].condition(),
            &Condition::HasKey("disused".to_string())
        );

        let bvg = config.registry().get("bvg").unwrap();
        assert!(bvg.requires_name());
        assert_eq!(bvg.name_keys(), vec!["name", "ref"]);

        let classifier = Classifier::new(config);
        let results = classifier.classify(&tags_from_pairs([
            ("railway", "station"),
            ("station", "light_rail"),
            ("operator", "BVG"),
            ("ref", "S1"),
        ]));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identifiers(), vec!["bvg", "rapid-transit"]);
        assert_eq!(results[0].name(), Some("S1"));
    }

    #[test]
    fn ignore_rules_and_mode() {
        let config = PoiConfig::from_xml_str(
            r#"<config ignore-mode="always">
  <ignore key="name" value="Parkplatz" nocase="true" />
  <ignore key="name" pattern="[0-9]+" />
</config>"#,
        )
        .unwrap();
        let (_, _, ignore) = config.into_parts();
        assert_eq!(ignore.mode(), IgnoreMode::Always);
        assert!(ignore.matches("name", "parkplatz"));
        assert!(ignore.matches("name", "17"));
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(PoiConfig::from_xml_str(r#"<config><class value="x" /></config>"#).is_err());
        assert!(PoiConfig::from_xml_str(
            r#"<config><map key="a"><class value="x" name="sometimes" /></map></config>"#
        )
        .is_err());
        assert!(PoiConfig::from_xml_str(r#"<config><ignore key="name" /></config>"#).is_err());
        assert!(PoiConfig::from_xml_str(
            r#"<config><ignore key="name" pattern="(" /></config>"#
        )
        .is_err());
        assert!(PoiConfig::from_xml_str(r#"<config ignore-mode="never" />"#).is_err());
    }
}
