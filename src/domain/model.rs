use serde::{Deserialize, Serialize};

pub type EntityId = usize;

/// Reference to a country or one of its dialing areas, by index into
/// the model's flat tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceRef {
    Country(usize),
    Area(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    /// ISO 3166 alpha-2 code, uppercase.
    pub iso: String,
    /// International dialing code.
    pub ccode: String,
    /// Domestic prefix dialled before an area code, e.g. "0".
    pub aprefix: Option<String>,
    /// Prefix of special numbers that take no area prefix, e.g. "1".
    pub sprefix: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub country: usize,
    /// Dialing area code, without the domestic prefix.
    pub acode: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Family,
    Organisation,
}

impl EntityKind {
    pub fn word(self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Family => "family",
            EntityKind::Organisation => "organisation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneKind {
    Fixed,
    Mobile,
    Fax,
}

impl PhoneKind {
    pub fn tag(self) -> &'static str {
        match self {
            PhoneKind::Fixed => "ph",
            PhoneKind::Mobile => "mob",
            PhoneKind::Fax => "fax",
        }
    }
}

/// Canonicalized number: country always resolved, area code split out
/// when known, local part kept as written (digits and dashes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phone {
    pub kind: PhoneKind,
    pub country: usize,
    pub acode: Option<String>,
    pub local: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub address: String,
}

/// Person-to-family link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub family: EntityId,
    pub head: bool,
}

/// Person-to-organisation link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub org: EntityId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub aliases: Vec<String>,
    pub place: Option<PlaceRef>,
    /// Indices into the model's interned keyword table.
    pub keywords: Vec<usize>,
    pub emails: Vec<Email>,
    pub phones: Vec<Phone>,
    pub memberships: Vec<Membership>,
    pub jobs: Vec<Job>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: String) -> Self {
        Entity {
            kind,
            name,
            aliases: Vec::new(),
            place: None,
            keywords: Vec::new(),
            emails: Vec::new(),
            phones: Vec::new(),
            memberships: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// Case-insensitive exact match on name or any alias.
    pub fn named(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.name.to_lowercase() == text || self.aliases.iter().any(|a| a.to_lowercase() == text)
    }

    /// Case-insensitive prefix match on name or any alias.
    pub fn name_starts_with(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.name.to_lowercase().starts_with(&text)
            || self.aliases.iter().any(|a| a.to_lowercase().starts_with(&text))
    }

    /// Case-insensitive substring match on name or any alias; the form
    /// used by bare query tokens.
    pub fn name_contains(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self
                .aliases
                .iter()
                .any(|a| a.to_lowercase().contains(needle_lower))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("no country or area matching \"{0}\"")]
    NoPlace(String),
    #[error("ambiguous place \"{0}\"")]
    AmbiguousPlace(String),
    #[error("no such {} \"{}\"", .0.word(), .1)]
    NoEntity(EntityKind, String),
    #[error("ambiguous {} \"{}\"", .0.word(), .1)]
    AmbiguousEntity(EntityKind, String),
}

/// The compiled graph: a world of countries and areas, an interned
/// keyword table, and a flat entity table with index links. Flat
/// storage keeps serialization depth constant no matter how large the
/// graph grows.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Model {
    pub countries: Vec<Country>,
    pub areas: Vec<Area>,
    pub keywords: Vec<String>,
    pub entities: Vec<Entity>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Model> {
        serde_json::from_slice(bytes)
    }

    pub fn add_country(&mut self, country: Country) -> Result<usize, String> {
        if self.countries.iter().any(|c| c.iso == country.iso) {
            return Err(format!("duplicate country {}", country.iso));
        }
        if self.countries.iter().any(|c| c.ccode == country.ccode) {
            return Err(format!("duplicate country code {}", country.ccode));
        }
        self.countries.push(country);
        Ok(self.countries.len() - 1)
    }

    pub fn add_area(&mut self, area: Area) -> Result<usize, String> {
        if self
            .areas
            .iter()
            .any(|a| a.country == area.country && a.acode == area.acode)
        {
            return Err(format!(
                "duplicate area {} in {}",
                area.acode, self.countries[area.country].name
            ));
        }
        self.areas.push(area);
        Ok(self.areas.len() - 1)
    }

    pub fn intern_keyword(&mut self, word: &str) -> usize {
        if let Some(i) = self.keywords.iter().position(|k| k == word) {
            return i;
        }
        self.keywords.push(word.to_string());
        self.keywords.len() - 1
    }

    /// Interned keyword lookup, case-insensitive.
    pub fn keyword(&self, word: &str) -> Option<usize> {
        self.keywords.iter().position(|k| k.eq_ignore_ascii_case(word))
    }

    pub fn register(&mut self, entity: Entity) -> Result<EntityId, String> {
        if self
            .entities
            .iter()
            .any(|e| e.kind == entity.kind && e.name.eq_ignore_ascii_case(&entity.name))
        {
            return Err(format!(
                "duplicate {} \"{}\"",
                entity.kind.word(),
                entity.name
            ));
        }
        self.entities.push(entity);
        Ok(self.entities.len() - 1)
    }

    /// Countries match on ISO code or name prefix; areas on code or
    /// name prefix. Countries win over areas, and within each table an
    /// ambiguous name is an error rather than an arbitrary pick.
    pub fn lookup_place(&self, name: &str) -> Result<PlaceRef, LookupError> {
        let matched: Vec<usize> = self
            .countries
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.iso.eq_ignore_ascii_case(name)
                    || c.name.to_lowercase().starts_with(&name.to_lowercase())
            })
            .map(|(i, _)| i)
            .collect();
        match matched.len() {
            1 => return Ok(PlaceRef::Country(matched[0])),
            n if n > 1 => return Err(LookupError::AmbiguousPlace(name.to_string())),
            _ => {}
        }
        let matched: Vec<usize> = self
            .areas
            .iter()
            .enumerate()
            .filter(|(_, a)| {
                a.acode == name || a.name.to_lowercase().starts_with(&name.to_lowercase())
            })
            .map(|(i, _)| i)
            .collect();
        match matched.len() {
            0 => Err(LookupError::NoPlace(name.to_string())),
            1 => Ok(PlaceRef::Area(matched[0])),
            _ => Err(LookupError::AmbiguousPlace(name.to_string())),
        }
    }

    /// Locate a registered entity of the given kind by name or alias.
    /// Exact matches win; otherwise a unique prefix match is accepted.
    pub fn find(&self, kind: EntityKind, text: &str) -> Result<EntityId, LookupError> {
        let exact: Vec<EntityId> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == kind && e.named(text))
            .map(|(i, _)| i)
            .collect();
        match exact.len() {
            1 => return Ok(exact[0]),
            n if n > 1 => return Err(LookupError::AmbiguousEntity(kind, text.to_string())),
            _ => {}
        }
        let prefixed: Vec<EntityId> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == kind && e.name_starts_with(text))
            .map(|(i, _)| i)
            .collect();
        match prefixed.len() {
            0 => Err(LookupError::NoEntity(kind, text.to_string())),
            1 => Ok(prefixed[0]),
            _ => Err(LookupError::AmbiguousEntity(kind, text.to_string())),
        }
    }

    pub fn place_country(&self, place: PlaceRef) -> usize {
        match place {
            PlaceRef::Country(i) => i,
            PlaceRef::Area(a) => self.areas[a].country,
        }
    }

    /// True when `inner` lies within `outer` (an area is within its
    /// country; every place is within itself).
    pub fn place_contains(&self, outer: PlaceRef, inner: PlaceRef) -> bool {
        inner == outer
            || matches!((outer, inner), (PlaceRef::Country(c), PlaceRef::Area(a))
                if self.areas[a].country == c)
    }

    pub fn describe_place(&self, place: PlaceRef) -> String {
        match place {
            PlaceRef::Country(i) => self.countries[i].name.clone(),
            PlaceRef::Area(a) => {
                let area = &self.areas[a];
                format!("{}, {}", area.name, self.countries[area.country].name)
            }
        }
    }

    /// Render a number relative to an optional reference place:
    /// another country sees the full international form, the same
    /// country sees the domestic form, and the same area sees just the
    /// local part. Numbers without an area code take the domestic
    /// prefix unless they start with the country's special prefix.
    pub fn format_phone(&self, phone: &Phone, local: Option<PlaceRef>) -> String {
        let country = &self.countries[phone.country];
        let same_country = local.map(|p| self.place_country(p)) == Some(phone.country);
        if !same_country {
            let mut parts = vec![format!("+{}", country.ccode)];
            if let Some(acode) = &phone.acode {
                parts.push(acode.clone());
            }
            parts.push(phone.local.clone());
            return parts.join(" ");
        }
        let local_acode = match local {
            Some(PlaceRef::Area(a)) => Some(self.areas[a].acode.as_str()),
            _ => None,
        };
        match &phone.acode {
            Some(acode) if local_acode == Some(acode.as_str()) => phone.local.clone(),
            Some(acode) => format!(
                "{}{} {}",
                country.aprefix.as_deref().unwrap_or(""),
                acode,
                phone.local
            ),
            None => {
                let special = country
                    .sprefix
                    .as_deref()
                    .is_some_and(|sp| phone.local.starts_with(sp));
                match country.aprefix.as_deref() {
                    Some(ap) if !special => format!("{}{}", ap, phone.local),
                    _ => phone.local.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Model {
        let mut m = Model::new();
        let au = m
            .add_country(Country {
                iso: "AU".into(),
                ccode: "61".into(),
                aprefix: Some("0".into()),
                sprefix: Some("1".into()),
                name: "Australia".into(),
            })
            .unwrap();
        m.add_area(Area {
            country: au,
            acode: "8".into(),
            name: "South Australia".into(),
        })
        .unwrap();
        m.add_country(Country {
            iso: "ES".into(),
            ccode: "34".into(),
            aprefix: None,
            sprefix: None,
            name: "Spain".into(),
        })
        .unwrap();
        m
    }

    #[test]
    fn lookup_place_prefers_countries_and_reports_misses() {
        let m = world();
        assert_eq!(m.lookup_place("au").unwrap(), PlaceRef::Country(0));
        assert_eq!(m.lookup_place("Aust").unwrap(), PlaceRef::Country(0));
        assert_eq!(m.lookup_place("South").unwrap(), PlaceRef::Area(0));
        assert_eq!(m.lookup_place("8").unwrap(), PlaceRef::Area(0));
        assert!(matches!(
            m.lookup_place("oz"),
            Err(LookupError::NoPlace(_))
        ));
    }

    #[test]
    fn fixed_number_renders_relative_to_place() {
        let m = world();
        let t = Phone {
            kind: PhoneKind::Fixed,
            country: 0,
            acode: Some("8".into()),
            local: "223-4567".into(),
        };
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Area(0))), "223-4567");
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Country(0))), "08 223-4567");
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Country(1))), "+61 8 223-4567");
        assert_eq!(m.format_phone(&t, None), "+61 8 223-4567");
    }

    #[test]
    fn mobile_number_takes_domestic_prefix_in_country() {
        let m = world();
        let t = Phone {
            kind: PhoneKind::Mobile,
            country: 0,
            acode: None,
            local: "411-123-456".into(),
        };
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Area(0))), "0411-123-456");
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Country(0))), "0411-123-456");
        assert_eq!(m.format_phone(&t, None), "+61 411-123-456");
    }

    #[test]
    fn special_number_keeps_its_prefix() {
        let m = world();
        let t = Phone {
            kind: PhoneKind::Fixed,
            country: 0,
            acode: None,
            local: "131-151".into(),
        };
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Area(0))), "131-151");
        assert_eq!(m.format_phone(&t, Some(PlaceRef::Country(1))), "+61 131-151");
    }

    #[test]
    fn model_round_trips_through_bytes() {
        let mut m = world();
        let kw = m.intern_keyword("friend");
        let mut e = Entity::new(EntityKind::Person, "John Smith".into());
        e.keywords.push(kw);
        e.place = Some(PlaceRef::Area(0));
        m.register(e).unwrap();
        let again = Model::from_bytes(&m.to_bytes().unwrap()).unwrap();
        assert_eq!(again.entities.len(), 1);
        assert_eq!(again.lookup_place("Spain").unwrap(), PlaceRef::Country(1));
        assert_eq!(
            again.find(EntityKind::Person, "john smith").unwrap(),
            m.find(EntityKind::Person, "John Smith").unwrap()
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut m = world();
        m.register(Entity::new(EntityKind::Person, "Jo".into())).unwrap();
        assert!(m.register(Entity::new(EntityKind::Person, "jo".into())).is_err());
        // Same name under a different kind is a different entity.
        m.register(Entity::new(EntityKind::Family, "Jo".into())).unwrap();
    }
}
