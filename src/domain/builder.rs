use crate::domain::model::{
    Area, Country, Entity, EntityId, EntityKind, Email, Job, Membership, Model, Phone, PhoneKind,
    PlaceRef,
};
use crate::source::Block;

#[derive(thiserror::Error, Debug)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Defaults {
    place: Option<PlaceRef>,
    keywords: Vec<usize>,
}

#[derive(Debug)]
enum PendingKind {
    MemberOf { head: bool },
    WorksAt,
}

/// A forward reference recorded while feeding blocks and resolved in
/// `finish_parsing`, so entities may refer to ones declared later in
/// the file.
#[derive(Debug)]
struct PendingLink {
    from: EntityId,
    kind: PendingKind,
    name: String,
    line: usize,
}

/// Accumulates a Model from source blocks. Protocol: `parse_block` for
/// every block, then `finish_parsing` once, then `finalise` exactly
/// once on every exit path (also after a parse failure), then
/// `into_model` to release the result.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: Model,
    last_country: Option<usize>,
    defaults: Defaults,
    pending: Vec<PendingLink>,
    finalised: bool,
}

impl ModelBuilder {
    pub fn new() -> Self {
        ModelBuilder::default()
    }

    pub fn parse_block(&mut self, block: &Block) -> Result<(), ParseError> {
        if block.first().map(|l| l.text.starts_with('%')).unwrap_or(false) {
            self.parse_control_block(block)
        } else if !block.is_empty() {
            self.parse_data_block(block)
        } else {
            Ok(())
        }
    }

    /// Resolve all recorded forward references. After this the builder
    /// accepts no further blocks.
    pub fn finish_parsing(&mut self) -> Result<(), ParseError> {
        let pending = std::mem::take(&mut self.pending);
        for link in pending {
            match link.kind {
                PendingKind::MemberOf { head } => {
                    let family = self
                        .model
                        .find(EntityKind::Family, &link.name)
                        .map_err(|e| ParseError::new(link.line, e.to_string()))?;
                    self.model.entities[link.from]
                        .memberships
                        .push(Membership { family, head });
                }
                PendingKind::WorksAt => {
                    let org = self
                        .model
                        .find(EntityKind::Organisation, &link.name)
                        .map_err(|e| ParseError::new(link.line, e.to_string()))?;
                    self.model.entities[link.from].jobs.push(Job { org });
                }
            }
        }
        Ok(())
    }

    /// Teardown. Must run whether or not parsing succeeded, once.
    pub fn finalise(&mut self) {
        debug_assert!(!self.finalised, "builder finalised twice");
        self.finalised = true;
        self.pending.clear();
    }

    pub fn finalised(&self) -> bool {
        self.finalised
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    fn parse_control_block(&mut self, block: &Block) -> Result<(), ParseError> {
        let mut current: Option<(usize, String)> = None;
        for line in block {
            let text = line.text.strip_prefix('%').ok_or_else(|| {
                ParseError::new(line.number, "illegal non-control line in a control block")
            })?;
            let cont = text.trim_start();
            if !cont.is_empty() && cont.len() != text.len() {
                match current.as_mut() {
                    Some((_, buf)) => {
                        buf.push(' ');
                        buf.push_str(cont.trim_end());
                    }
                    None => {
                        return Err(ParseError::new(line.number, "misplaced continuation line"))
                    }
                }
            } else {
                if let Some((n, ctl)) = current.take() {
                    self.control(n, &ctl)?;
                }
                current = Some((line.number, text.trim_end().to_string()));
            }
        }
        if let Some((n, ctl)) = current.take() {
            self.control(n, &ctl)?;
        }
        Ok(())
    }

    fn control(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let Some((word, rest)) = split_field(text) else {
            return Err(ParseError::new(line, "empty control line"));
        };
        match word {
            "country" => self.control_country(line, rest),
            "area" => self.control_area(line, rest),
            "default" => self.control_default(line, rest),
            _ => Err(ParseError::new(
                line,
                format!("unsupported control \"%{word}\""),
            )),
        }
    }

    fn control_country(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let mut tokens = text.split_whitespace();
        let iso = tokens.next().unwrap_or("");
        if iso.len() != 2 || !iso.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ParseError::new(
                line,
                format!("invalid country code \"{iso}\""),
            ));
        }
        let mut ccode = None;
        let mut aprefix = None;
        let mut sprefix = None;
        let mut name_words: Vec<&str> = Vec::new();
        for token in tokens {
            if let Some(value) = token.strip_prefix("cc=") {
                ccode = Some(digits(value, line, token)?);
            } else if let Some(value) = token.strip_prefix("ap=") {
                aprefix = Some(digits(value, line, token)?);
            } else if let Some(value) = token.strip_prefix("sp=") {
                sprefix = Some(digits(value, line, token)?);
            } else {
                name_words.push(token);
            }
        }
        let Some(ccode) = ccode else {
            return Err(ParseError::new(line, "missing cc="));
        };
        if sprefix.is_some() && aprefix.is_none() {
            return Err(ParseError::new(line, "sp= without ap="));
        }
        if sprefix.is_some() && sprefix == aprefix {
            return Err(ParseError::new(line, "sp= and ap= must be different"));
        }
        if name_words.is_empty() {
            return Err(ParseError::new(line, "missing country name"));
        }
        let idx = self
            .model
            .add_country(Country {
                iso: iso.to_string(),
                ccode,
                aprefix,
                sprefix,
                name: name_words.join(" "),
            })
            .map_err(|m| ParseError::new(line, m))?;
        self.last_country = Some(idx);
        Ok(())
    }

    fn control_area(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let Some(country) = self.last_country else {
            return Err(ParseError::new(line, "no preceding country definition"));
        };
        let Some((acode, name)) = split_field(text) else {
            return Err(ParseError::new(line, "missing area code"));
        };
        let acode = digits(acode, line, acode)?;
        if name.is_empty() {
            return Err(ParseError::new(line, "missing area name"));
        }
        self.model
            .add_area(Area {
                country,
                acode,
                name: name.to_string(),
            })
            .map_err(|m| ParseError::new(line, m))?;
        Ok(())
    }

    fn control_default(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let Some((key, value)) = split_field(text) else {
            return Err(ParseError::new(line, "empty %default"));
        };
        match key {
            "in" => {
                if value.is_empty() {
                    return Err(ParseError::new(line, "%default in: missing place or \"none\""));
                }
                self.defaults.place = if value == "none" {
                    None
                } else {
                    Some(
                        self.model
                            .lookup_place(value)
                            .map_err(|e| ParseError::new(line, e.to_string()))?,
                    )
                };
                Ok(())
            }
            "key" => {
                self.defaults.keywords = self.parse_keywords(value, line)?;
                Ok(())
            }
            _ => Err(ParseError::new(
                line,
                format!("unsupported %default \"{key}\""),
            )),
        }
    }

    fn parse_data_block(&mut self, block: &Block) -> Result<(), ParseError> {
        let first = &block[0];
        let Some((word, name)) = split_field(&first.text) else {
            return Err(ParseError::new(first.number, "malformed line"));
        };
        let kind = match word {
            "person" => EntityKind::Person,
            "family" => EntityKind::Family,
            "org" => EntityKind::Organisation,
            _ => {
                return Err(ParseError::new(
                    first.number,
                    format!("unknown entry type \"{word}\""),
                ))
            }
        };
        if name.is_empty() {
            return Err(ParseError::new(first.number, format!("missing {word} name")));
        }
        let mut entity = Entity::new(kind, name.to_string());
        entity.place = self.defaults.place;
        entity.keywords = self.defaults.keywords.clone();

        // The place context governs phone canonicalization, so settle
        // any "in" line before the other fields.
        let mut saw_in = false;
        for line in &block[1..] {
            let Some((key, rest)) = split_field(&line.text) else {
                continue;
            };
            if key != "in" {
                continue;
            }
            if saw_in {
                return Err(ParseError::new(line.number, "duplicate \"in\" line"));
            }
            saw_in = true;
            entity.place = match rest {
                "" => return Err(ParseError::new(line.number, "in: missing place or \"none\"")),
                "none" => None,
                place => Some(
                    self.model
                        .lookup_place(place)
                        .map_err(|e| ParseError::new(line.number, e.to_string()))?,
                ),
            };
        }

        let mut pending: Vec<(PendingKind, String, usize)> = Vec::new();
        for line in &block[1..] {
            let Some((key, rest)) = split_field(&line.text) else {
                continue;
            };
            match key {
                "in" => {}
                "aka" => {
                    if rest.is_empty() {
                        return Err(ParseError::new(line.number, "aka: missing name"));
                    }
                    entity.aliases.push(rest.to_string());
                }
                "key" => {
                    for k in self.parse_keywords(rest, line.number)? {
                        if !entity.keywords.contains(&k) {
                            entity.keywords.push(k);
                        }
                    }
                }
                "of" | "head" => {
                    require_person(kind, key, line.number)?;
                    if rest.is_empty() {
                        return Err(ParseError::new(line.number, format!("{key}: missing family")));
                    }
                    pending.push((
                        PendingKind::MemberOf { head: key == "head" },
                        rest.to_string(),
                        line.number,
                    ));
                }
                "works" => {
                    require_person(kind, key, line.number)?;
                    if rest.is_empty() {
                        return Err(ParseError::new(line.number, "works: missing organisation"));
                    }
                    pending.push((PendingKind::WorksAt, rest.to_string(), line.number));
                }
                "email" => {
                    if !rest.contains('@') {
                        return Err(ParseError::new(
                            line.number,
                            format!("malformed email address \"{rest}\""),
                        ));
                    }
                    entity.emails.push(Email {
                        address: rest.to_string(),
                    });
                }
                "ph" | "mob" | "fax" => {
                    let phone_kind = match key {
                        "ph" => PhoneKind::Fixed,
                        "mob" => PhoneKind::Mobile,
                        _ => PhoneKind::Fax,
                    };
                    let phone = self.parse_phone(phone_kind, rest, entity.place, line.number)?;
                    entity.phones.push(phone);
                }
                _ => {
                    return Err(ParseError::new(
                        line.number,
                        format!("unknown field \"{key}\""),
                    ))
                }
            }
        }

        let id = self
            .model
            .register(entity)
            .map_err(|m| ParseError::new(first.number, m))?;
        for (kind, name, line) in pending {
            self.pending.push(PendingLink {
                from: id,
                kind,
                name,
                line,
            });
        }
        Ok(())
    }

    fn parse_keywords(&mut self, text: &str, line: usize) -> Result<Vec<usize>, ParseError> {
        let mut out = Vec::new();
        for word in text.split(',').flat_map(str::split_whitespace) {
            if !word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ParseError::new(line, format!("malformed keyword \"{word}\"")));
            }
            let k = self.model.intern_keyword(word);
            if !out.contains(&k) {
                out.push(k);
            }
        }
        if out.is_empty() {
            return Err(ParseError::new(line, "missing keyword"));
        }
        Ok(out)
    }

    fn parse_phone(
        &self,
        kind: PhoneKind,
        text: &str,
        place: Option<PlaceRef>,
        line: usize,
    ) -> Result<Phone, ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let malformed = || ParseError::new(line, format!("malformed phone number \"{text}\""));
        if let Some(cc) = tokens.first().and_then(|t| t.strip_prefix('+')) {
            let country = self
                .model
                .countries
                .iter()
                .position(|c| c.ccode == cc)
                .ok_or_else(|| {
                    ParseError::new(line, format!("unknown country code \"+{cc}\""))
                })?;
            let (acode, local) = match tokens.as_slice() {
                [_, local] => (None, *local),
                [_, acode, local] => (Some((*acode).to_string()), *local),
                _ => return Err(malformed()),
            };
            if let Some(acode) = &acode {
                if !acode.chars().all(|c| c.is_ascii_digit()) {
                    return Err(malformed());
                }
            }
            check_local(local).map_err(|()| malformed())?;
            return Ok(Phone {
                kind,
                country,
                acode,
                local: local.to_string(),
            });
        }
        let [local] = tokens.as_slice() else {
            return Err(malformed());
        };
        check_local(local).map_err(|()| malformed())?;
        let place = place.ok_or_else(|| {
            ParseError::new(line, format!("phone number \"{text}\" has no place context"))
        })?;
        let country = self.model.place_country(place);
        let acode = match (kind, place) {
            (PhoneKind::Mobile, _) => None,
            (_, PlaceRef::Area(a)) => Some(self.model.areas[a].acode.clone()),
            _ => None,
        };
        Ok(Phone {
            kind,
            country,
            acode,
            local: local.to_string(),
        })
    }
}

fn require_person(kind: EntityKind, key: &str, line: usize) -> Result<(), ParseError> {
    if kind == EntityKind::Person {
        Ok(())
    } else {
        Err(ParseError::new(
            line,
            format!("\"{key}\" only applies to a person"),
        ))
    }
}

fn split_field(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((text, "")),
    }
}

fn digits(value: &str, line: usize, token: &str) -> Result<String, ParseError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::new(line, format!("malformed \"{token}\"")));
    }
    Ok(value.to_string())
}

fn check_local(local: &str) -> Result<(), ()> {
    if !local.is_empty() && local.chars().all(|c| c.is_ascii_digit() || c == '-') {
        Ok(())
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{self, Line};

    fn feed(text: &str) -> Result<ModelBuilder, ParseError> {
        let lines: Vec<Line> = text
            .lines()
            .enumerate()
            .map(|(i, t)| Line {
                number: i + 1,
                text: t.to_string(),
            })
            .collect();
        let mut builder = ModelBuilder::new();
        for block in source::blocks(source::remove_comments(lines)) {
            builder.parse_block(&block)?;
        }
        builder.finish_parsing()?;
        Ok(builder)
    }

    fn build(text: &str) -> Result<Model, ParseError> {
        let mut builder = feed(text)?;
        builder.finalise();
        Ok(builder.into_model())
    }

    const WORLD: &str = "%country AU cc=61 ap=0 sp=1 Australia\n%area 8 South Australia\n";

    #[test]
    fn builds_entities_with_forward_references() {
        let model = build(
            "%country AU cc=61 ap=0 sp=1 Australia\n\
             %area 8 South Australia\n\
             %default in South Australia\n\
             \n\
             person John Smith\n\
             aka Johnny\n\
             key friend\n\
             head Smith Family\n\
             works Acme\n\
             email john@example.com\n\
             ph 8123-4567\n\
             mob 411-123-456\n\
             \n\
             family Smith Family\n\
             \n\
             org Acme\n\
             ph +61 8 8000-0000\n",
        )
        .unwrap();

        assert_eq!(model.entities.len(), 3);
        let john = &model.entities[model.find(EntityKind::Person, "Johnny").unwrap()];
        assert_eq!(john.memberships.len(), 1);
        assert!(john.memberships[0].head);
        assert_eq!(john.jobs.len(), 1);
        assert_eq!(model.entities[john.jobs[0].org].name, "Acme");
        // Fixed line picked up the area code from the place context;
        // the mobile did not.
        assert_eq!(john.phones[0].acode.as_deref(), Some("8"));
        assert_eq!(john.phones[1].acode, None);
        assert_eq!(model.keyword("friend"), Some(john.keywords[0]));
    }

    #[test]
    fn control_continuation_lines_are_joined() {
        let model = build("%country AU cc=61 ap=0\n%   sp=1 Australia\n").unwrap();
        assert_eq!(model.countries[0].sprefix.as_deref(), Some("1"));
        assert_eq!(model.countries[0].name, "Australia");
    }

    #[test]
    fn default_keywords_apply_to_later_entities() {
        let model = build(&format!(
            "{WORLD}%default key club, committee\n\nperson Jo Bloggs\n"
        ))
        .unwrap();
        let jo = &model.entities[0];
        assert_eq!(jo.keywords.len(), 2);
    }

    #[test]
    fn area_without_country_is_an_error() {
        let err = build("%area 8 South Australia\n").unwrap_err();
        assert!(err.message.contains("no preceding country"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unsupported_control_is_an_error() {
        let err = build("%colour blue\n").unwrap_err();
        assert!(err.message.contains("unsupported control \"%colour\""));
    }

    #[test]
    fn unknown_entry_type_is_an_error() {
        let err = build("widget Thing\n").unwrap_err();
        assert!(err.message.contains("unknown entry type \"widget\""));
    }

    #[test]
    fn duplicate_entity_is_an_error() {
        let err = build("person Jo\n\nperson jo\n").unwrap_err();
        assert!(err.message.contains("duplicate person"));
    }

    #[test]
    fn works_on_family_is_an_error() {
        let err = build("family Bloggs\nworks Acme\n").unwrap_err();
        assert!(err.message.contains("only applies to a person"));
    }

    #[test]
    fn unresolved_forward_reference_fails_in_finish() {
        let err = build("person Jo\nworks Nowhere Inc\n").unwrap_err();
        assert!(err.message.contains("no such organisation \"Nowhere Inc\""));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn phone_without_place_context_is_an_error() {
        let err = build("person Jo\nph 8123-4567\n").unwrap_err();
        assert!(err.message.contains("no place context"));
    }

    #[test]
    fn international_phone_with_unknown_code_is_an_error() {
        let err = build(&format!("{WORLD}\nperson Jo\nph +99 1234\n")).unwrap_err();
        assert!(err.message.contains("unknown country code \"+99\""));
    }
}
