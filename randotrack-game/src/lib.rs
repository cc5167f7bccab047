use anyhow::{bail, ensure, Context, Result};
use hashbrown::{HashMap, HashSet};
use json::JsonValue;
use log::info;
use std::fs::File;
use std::path::Path;

pub type ItemCount = i32; // Quantity of one item kind, held or required

// Sentinel requirement tokens from the logic tables:
pub const TOKEN_IMPOSSIBLE: &str = "Impossible";
pub const TOKEN_NOTHING: &str = "Nothing";

const HAS_ACCESSED_PREFIX: &str = "Has Accessed Other Location \"";

/// A requirement expression from the game's logic tables. Leaf variants are
/// the five atomic requirement forms, classified once at load time so that
/// evaluation never re-parses token text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
    Impossible,
    Nothing,
    Item(String),
    ItemCount {
        name: String,
        count: ItemCount,
    },
    HasAccessedLocation {
        general: String,
        detailed: String,
    },
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

/// A child value passed to a `reduce` reducer: either a raw atom, or the
/// already-reduced result of a nested compound.
pub enum Folded<'a, T> {
    Atom(&'a Requirement),
    Reduced(T),
}

impl Requirement {
    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Impossible = req {
                return Requirement::Impossible;
            } else if let Requirement::Nothing = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Nothing
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Nothing = req {
                return Requirement::Nothing;
            } else if let Requirement::Impossible = req {
                continue;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Impossible
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::Or(out_reqs)
        }
    }

    pub fn is_atom(&self) -> bool {
        !matches!(self, Requirement::And(_) | Requirement::Or(_))
    }

    /// Boolean fold: AND of children for `And`, OR of children for `Or`,
    /// `is_atom_true` for leaves.
    pub fn evaluate(&self, is_atom_true: &impl Fn(&Requirement) -> bool) -> bool {
        match self {
            Requirement::And(children) => children.iter().all(|c| c.evaluate(is_atom_true)),
            Requirement::Or(children) => children.iter().any(|c| c.evaluate(is_atom_true)),
            atom => is_atom_true(atom),
        }
    }

    /// Generic fold. Each child is passed to the enclosing operator's reducer
    /// either as a raw atom or as the already-reduced result of a nested
    /// compound. A bare atom at the root reduces as a single-element
    /// conjunction.
    pub fn reduce<'a, T, FAnd, FOr>(
        &'a self,
        and_init: T,
        and_reducer: &FAnd,
        or_init: T,
        or_reducer: &FOr,
    ) -> T
    where
        T: Clone,
        FAnd: Fn(T, Folded<'a, T>) -> T,
        FOr: Fn(T, Folded<'a, T>) -> T,
    {
        match self {
            Requirement::And(children) => {
                let mut acc = and_init.clone();
                for child in children {
                    let folded = if child.is_atom() {
                        Folded::Atom(child)
                    } else {
                        Folded::Reduced(child.reduce(
                            and_init.clone(),
                            and_reducer,
                            or_init.clone(),
                            or_reducer,
                        ))
                    };
                    acc = and_reducer(acc, folded);
                }
                acc
            }
            Requirement::Or(children) => {
                let mut acc = or_init.clone();
                for child in children {
                    let folded = if child.is_atom() {
                        Folded::Atom(child)
                    } else {
                        Folded::Reduced(child.reduce(
                            and_init.clone(),
                            and_reducer,
                            or_init.clone(),
                            or_reducer,
                        ))
                    };
                    acc = or_reducer(acc, folded);
                }
                acc
            }
            atom => and_reducer(and_init, Folded::Atom(atom)),
        }
    }

    /// Visits every leaf of the expression, depth-first in source order.
    pub fn for_each_atom(&self, f: &mut impl FnMut(&Requirement)) {
        match self {
            Requirement::And(children) | Requirement::Or(children) => {
                for child in children {
                    child.for_each_atom(f);
                }
            }
            atom => f(atom),
        }
    }

    /// Display text for a requirement, as shown in requirement explanations.
    pub fn pretty_name(&self) -> String {
        match self {
            Requirement::Impossible => TOKEN_IMPOSSIBLE.to_string(),
            Requirement::Nothing => TOKEN_NOTHING.to_string(),
            Requirement::Item(name) => name.clone(),
            Requirement::ItemCount { name, count } => format!("{name} x{count}"),
            Requirement::HasAccessedLocation { general, detailed } => {
                format!("{HAS_ACCESSED_PREFIX}{general}/{detailed}\"")
            }
            Requirement::And(children) => {
                let names: Vec<String> = children.iter().map(|c| c.pretty_name()).collect();
                names.join(" and ")
            }
            Requirement::Or(children) => {
                let names: Vec<String> = children.iter().map(|c| c.pretty_name()).collect();
                names.join(" or ")
            }
        }
    }
}

/// Classifies an atomic requirement token into one of the five recognized
/// forms. The first matching rule wins; the bare-item rule is validated
/// against the item table so that misspelled tokens fail here rather than
/// silently evaluating as an unheld item.
pub fn classify_atom(token: &str, item_names: &HashSet<String>) -> Result<Requirement> {
    if token == TOKEN_IMPOSSIBLE {
        return Ok(Requirement::Impossible);
    }
    if token == TOKEN_NOTHING {
        return Ok(Requirement::Nothing);
    }
    if let Some((name, count)) = parse_item_count(token) {
        if item_names.contains(name) {
            return Ok(Requirement::ItemCount {
                name: name.to_string(),
                count,
            });
        }
    }
    if item_names.contains(token) {
        return Ok(Requirement::Item(token.to_string()));
    }
    if let Some(rest) = token.strip_prefix(HAS_ACCESSED_PREFIX) {
        if let Some(full_name) = rest.strip_suffix('"') {
            let (general, detailed) = split_location_name(full_name)?;
            return Ok(Requirement::HasAccessedLocation { general, detailed });
        }
    }
    bail!("could not classify requirement token: {token}");
}

fn parse_item_count(token: &str) -> Option<(&str, ItemCount)> {
    let (name, count_str) = token.rsplit_once(" x")?;
    if name.is_empty() || count_str.is_empty() || !count_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count: ItemCount = count_str.parse().ok()?;
    Some((name, count))
}

/// Splits a combined `"General/Detailed"` location name on its first slash.
pub fn split_location_name(full_name: &str) -> Result<(String, String)> {
    let (general, detailed) = full_name
        .split_once('/')
        .with_context(|| format!("location name missing general/detailed separator: {full_name}"))?;
    Ok((general.to_string(), detailed.to_string()))
}

#[derive(Clone, Debug)]
pub struct DetailedLocation {
    pub name: String,
    pub requirement: Requirement,
    pub is_progress: bool,
    pub is_dungeon: bool,
}

#[derive(Clone, Debug)]
pub struct GeneralLocation {
    pub name: String,
    pub locations: Vec<DetailedLocation>,
    index_by_name: HashMap<String, usize>,
}

impl GeneralLocation {
    fn new(name: String, locations: Vec<DetailedLocation>) -> Self {
        let index_by_name = locations
            .iter()
            .enumerate()
            .map(|(i, loc)| (loc.name.clone(), i))
            .collect();
        GeneralLocation {
            name,
            locations,
            index_by_name,
        }
    }

    pub fn location(&self, detailed: &str) -> &DetailedLocation {
        &self.locations[self.index_by_name[detailed]]
    }

    fn location_index(&self, detailed: &str) -> Option<usize> {
        self.index_by_name.get(detailed).copied()
    }
}

/// Which detailed locations of a general location to include in a query.
#[derive(Copy, Clone, Debug, Default)]
pub struct LocationFilter {
    pub is_dungeon: Option<bool>,
    pub only_progress: bool,
}

#[derive(Clone, Debug)]
pub struct Dungeon {
    pub name: String,
    pub max_small_keys: ItemCount,
    pub small_key_name: String,
    pub big_key_name: String,
    pub is_main_dungeon: bool,
    // Detailed location name -> small keys required to reach it:
    pub key_locations: HashMap<String, ItemCount>,
}

impl Dungeon {
    pub fn is_potential_key_location(&self, detailed: &str) -> bool {
        self.key_locations.contains_key(detailed)
    }

    pub fn small_keys_required(&self, detailed: &str) -> ItemCount {
        self.key_locations[detailed]
    }
}

#[derive(Clone, Debug)]
pub struct Entrance {
    pub name: String,
    pub requirement: Requirement,
}

/// Static logic data for one game: item table, locations with their
/// requirement expressions, dungeon key data, and entrances. Built once from
/// a JSON logic table and shared read-only by every evaluator.
#[derive(Clone, Debug, Default)]
pub struct GameData {
    // Item name -> maximum obtainable count:
    pub items: HashMap<String, ItemCount>,
    pub general_locations: Vec<GeneralLocation>,
    general_index: HashMap<String, usize>,
    pub dungeons: Vec<Dungeon>,
    dungeon_index: HashMap<String, usize>,
    pub entrances: Vec<Entrance>,
    entrance_index: HashMap<String, usize>,
    pub final_general_location: String,
    pub final_detailed_location: String,
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let json_str = std::io::read_to_string(file)
        .with_context(|| format!("unable to read {}", path.display()))?;
    let json_data =
        json::parse(&json_str).with_context(|| format!("unable to parse {}", path.display()))?;
    Ok(json_data)
}

impl GameData {
    pub fn load(path: &Path) -> Result<GameData> {
        let logic_json = read_json(path)?;
        let game_data = GameData::from_json(&logic_json)
            .with_context(|| format!("unable to load logic data from {}", path.display()))?;
        info!(
            "loaded logic data: {} general locations, {} dungeons, {} entrances",
            game_data.general_locations.len(),
            game_data.dungeons.len(),
            game_data.entrances.len()
        );
        Ok(game_data)
    }

    pub fn from_json(logic_json: &JsonValue) -> Result<GameData> {
        let mut game_data = GameData::default();
        game_data.load_items(logic_json)?;
        game_data.load_locations(logic_json)?;
        game_data.load_entrances(logic_json)?;
        game_data.load_dungeons(logic_json)?;
        game_data.load_final_location(logic_json)?;
        game_data.validate_cross_location_references()?;
        Ok(game_data)
    }

    fn load_items(&mut self, logic_json: &JsonValue) -> Result<()> {
        ensure!(
            logic_json["items"].is_object(),
            "\"items\" missing or not an object"
        );
        for (name, value) in logic_json["items"].entries() {
            let max_count = value
                .as_i32()
                .with_context(|| format!("item {name} has a non-integer count"))?;
            ensure!(max_count >= 0, "item {name} has a negative count");
            self.items.insert(name.to_string(), max_count);
        }
        Ok(())
    }

    fn load_locations(&mut self, logic_json: &JsonValue) -> Result<()> {
        let item_names: HashSet<String> = self.items.keys().cloned().collect();
        ensure!(
            logic_json["locations"].is_array(),
            "\"locations\" missing or not an array"
        );
        for general_json in logic_json["locations"].members() {
            let general_name = general_json["name"]
                .as_str()
                .context("general location missing \"name\"")?;
            ensure!(
                general_json["locations"].is_array(),
                "general location {general_name} missing \"locations\" array"
            );
            let mut locations: Vec<DetailedLocation> = vec![];
            for loc_json in general_json["locations"].members() {
                let name = loc_json["name"].as_str().with_context(|| {
                    format!("detailed location under {general_name} missing \"name\"")
                })?;
                let requirement = parse_requirement(&loc_json["need"], &item_names)
                    .with_context(|| format!("invalid requirement for {general_name}/{name}"))?;
                locations.push(DetailedLocation {
                    name: name.to_string(),
                    requirement,
                    is_progress: loc_json["progress"].as_bool().unwrap_or(false),
                    is_dungeon: loc_json["dungeon"].as_bool().unwrap_or(false),
                });
            }
            ensure!(
                !self.general_index.contains_key(general_name),
                "duplicate general location: {general_name}"
            );
            self.general_index
                .insert(general_name.to_string(), self.general_locations.len());
            self.general_locations
                .push(GeneralLocation::new(general_name.to_string(), locations));
        }
        Ok(())
    }

    fn load_entrances(&mut self, logic_json: &JsonValue) -> Result<()> {
        let item_names: HashSet<String> = self.items.keys().cloned().collect();
        for entrance_json in logic_json["entrances"].members() {
            let name = entrance_json["name"]
                .as_str()
                .context("entrance missing \"name\"")?;
            let requirement = parse_requirement(&entrance_json["need"], &item_names)
                .with_context(|| format!("invalid requirement for entrance {name}"))?;
            ensure!(
                !self.entrance_index.contains_key(name),
                "duplicate entrance: {name}"
            );
            self.entrance_index
                .insert(name.to_string(), self.entrances.len());
            self.entrances.push(Entrance {
                name: name.to_string(),
                requirement,
            });
        }
        Ok(())
    }

    fn load_dungeons(&mut self, logic_json: &JsonValue) -> Result<()> {
        for dungeon_json in logic_json["dungeons"].members() {
            let name = dungeon_json["name"]
                .as_str()
                .context("dungeon missing \"name\"")?;
            let general = self
                .general_index
                .get(name)
                .with_context(|| format!("dungeon {name} is not a known general location"))?;
            let general = &self.general_locations[*general];
            let max_small_keys = dungeon_json["maxSmallKeys"]
                .as_i32()
                .with_context(|| format!("dungeon {name} missing \"maxSmallKeys\""))?;
            let small_key_name = dungeon_json["smallKey"]
                .as_str()
                .with_context(|| format!("dungeon {name} missing \"smallKey\""))?;
            let big_key_name = dungeon_json["bigKey"]
                .as_str()
                .with_context(|| format!("dungeon {name} missing \"bigKey\""))?;
            for key_name in [small_key_name, big_key_name] {
                ensure!(
                    self.items.contains_key(key_name),
                    "dungeon {name} key {key_name} is not in the item table"
                );
            }
            let mut key_locations: HashMap<String, ItemCount> = HashMap::new();
            for (detailed, required) in dungeon_json["keyLocations"].entries() {
                ensure!(
                    general.location_index(detailed).is_some(),
                    "dungeon {name} key location {detailed} is not a known detailed location"
                );
                let required = required.as_i32().with_context(|| {
                    format!("dungeon {name} key location {detailed} has a non-integer key count")
                })?;
                key_locations.insert(detailed.to_string(), required);
            }
            ensure!(
                !self.dungeon_index.contains_key(name),
                "duplicate dungeon: {name}"
            );
            self.dungeon_index
                .insert(name.to_string(), self.dungeons.len());
            self.dungeons.push(Dungeon {
                name: name.to_string(),
                max_small_keys,
                small_key_name: small_key_name.to_string(),
                big_key_name: big_key_name.to_string(),
                is_main_dungeon: dungeon_json["mainDungeon"].as_bool().unwrap_or(false),
                key_locations,
            });
        }
        Ok(())
    }

    fn load_final_location(&mut self, logic_json: &JsonValue) -> Result<()> {
        let full_name = logic_json["finalLocation"]
            .as_str()
            .context("\"finalLocation\" missing or not a string")?;
        let (general, detailed) = split_location_name(full_name)?;
        ensure!(
            self.location_index(&general, &detailed).is_some(),
            "final location {general}/{detailed} is not a known location"
        );
        self.final_general_location = general;
        self.final_detailed_location = detailed;
        Ok(())
    }

    // Every cross-location reference must name a known location, and the
    // reference graph must be acyclic: the evaluator recurses through these
    // references, so a cycle would be unbounded recursion at query time.
    fn validate_cross_location_references(&self) -> Result<()> {
        let mut marks: HashMap<(usize, usize), Mark> = HashMap::new();
        for (gi, general) in self.general_locations.iter().enumerate() {
            for di in 0..general.locations.len() {
                self.visit_location(gi, di, &mut marks)?;
            }
        }
        for entrance in &self.entrances {
            for (general, detailed) in cross_location_references(&entrance.requirement) {
                ensure!(
                    self.location_index(&general, &detailed).is_some(),
                    "entrance {} requires unknown location {general}/{detailed}",
                    entrance.name
                );
            }
        }
        Ok(())
    }

    fn visit_location(
        &self,
        gi: usize,
        di: usize,
        marks: &mut HashMap<(usize, usize), Mark>,
    ) -> Result<()> {
        match marks.get(&(gi, di)) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => bail!(
                "cross-location requirement cycle through {}/{}",
                self.general_locations[gi].name,
                self.general_locations[gi].locations[di].name
            ),
            None => {}
        }
        marks.insert((gi, di), Mark::InProgress);
        let source = &self.general_locations[gi].locations[di];
        for (general, detailed) in cross_location_references(&source.requirement) {
            let (target_gi, target_di) =
                self.location_index(&general, &detailed).with_context(|| {
                    format!(
                        "{}/{} requires unknown location {general}/{detailed}",
                        self.general_locations[gi].name, source.name
                    )
                })?;
            self.visit_location(target_gi, target_di, marks)?;
        }
        marks.insert((gi, di), Mark::Done);
        Ok(())
    }

    pub fn general_locations(&self) -> &[GeneralLocation] {
        &self.general_locations
    }

    pub fn general(&self, name: &str) -> &GeneralLocation {
        &self.general_locations[self.general_index[name]]
    }

    pub fn detailed_locations(&self, general: &str) -> &[DetailedLocation] {
        &self.general(general).locations
    }

    pub fn filter_detailed_locations(
        &self,
        general: &str,
        filter: &LocationFilter,
    ) -> Vec<&DetailedLocation> {
        self.general(general)
            .locations
            .iter()
            .filter(|loc| {
                if let Some(is_dungeon) = filter.is_dungeon {
                    if loc.is_dungeon != is_dungeon {
                        return false;
                    }
                }
                !filter.only_progress || loc.is_progress
            })
            .collect()
    }

    pub fn requirements_for_location(&self, general: &str, detailed: &str) -> &Requirement {
        &self.general(general).location(detailed).requirement
    }

    pub fn is_progress_location(&self, general: &str, detailed: &str) -> bool {
        self.general(general).location(detailed).is_progress
    }

    pub fn entrance(&self, name: &str) -> &Entrance {
        &self.entrances[self.entrance_index[name]]
    }

    pub fn requirements_for_entrance(&self, name: &str) -> &Requirement {
        &self.entrance(name).requirement
    }

    pub fn dungeon(&self, name: &str) -> Option<&Dungeon> {
        self.dungeon_index.get(name).map(|&i| &self.dungeons[i])
    }

    /// All small and big key item names, across every dungeon.
    pub fn key_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.dungeons.iter().flat_map(|dungeon| {
            [
                dungeon.small_key_name.as_str(),
                dungeon.big_key_name.as_str(),
            ]
        })
    }

    pub fn location_index(&self, general: &str, detailed: &str) -> Option<(usize, usize)> {
        let gi = self.general_index.get(general).copied()?;
        let di = self.general_locations[gi].location_index(detailed)?;
        Some((gi, di))
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

fn cross_location_references(requirement: &Requirement) -> Vec<(String, String)> {
    let mut refs: Vec<(String, String)> = vec![];
    requirement.for_each_atom(&mut |atom| {
        if let Requirement::HasAccessedLocation { general, detailed } = atom {
            refs.push((general.clone(), detailed.clone()));
        }
    });
    refs
}

/// Builds a requirement tree from a raw logic-table node: a token string, or
/// an object with a single `and`/`or` array of child nodes.
pub fn parse_requirement(
    req_json: &JsonValue,
    item_names: &HashSet<String>,
) -> Result<Requirement> {
    if req_json.is_string() {
        return classify_atom(req_json.as_str().unwrap(), item_names);
    }
    if req_json.is_object() {
        if req_json.has_key("and") {
            ensure!(req_json["and"].is_array(), "\"and\" is not an array");
            let mut reqs: Vec<Requirement> = vec![];
            for child_json in req_json["and"].members() {
                reqs.push(parse_requirement(child_json, item_names)?);
            }
            return Ok(Requirement::make_and(reqs));
        }
        if req_json.has_key("or") {
            ensure!(req_json["or"].is_array(), "\"or\" is not an array");
            let mut reqs: Vec<Requirement> = vec![];
            for child_json in req_json["or"].members() {
                reqs.push(parse_requirement(child_json, item_names)?);
            }
            return Ok(Requirement::make_or(reqs));
        }
    }
    bail!("unrecognized requirement node: {req_json}");
}
