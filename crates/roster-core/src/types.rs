use std::fmt;

use chrono::{DateTime, Utc};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use uuid::Uuid;

/// Event identifier (UUIDv7 simple form, 32 hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Parse an id supplied by a client. Anything that could not have been
    /// issued by [`EventId::new`] is rejected so lookups can short-circuit.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let well_formed = (16..=64).contains(&s.len())
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        well_formed.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle of an event. `Closed` is terminal: no roster changes accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Open => write!(f, "open"),
            EventStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(EventStatus::Open),
            "closed" => Ok(EventStatus::Closed),
            other => Err(format!("unknown event status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub text: String,
    pub url: String,
}

/// A registration record. Created by a successful registration, destroyed by
/// a successful cancellation, never edited in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    /// Account that registered this player (ownership reference only).
    pub register_by: String,
    #[serde(default)]
    pub is_keeper: bool,
}

impl Player {
    pub fn new(name: impl Into<String>, register_by: impl Into<String>, is_keeper: bool) -> Self {
        Self {
            name: name.into(),
            register_by: register_by.into(),
            is_keeper,
        }
    }

    /// True when both names collide under the event's uniqueness rule.
    pub fn same_name(&self, other: &str) -> bool {
        name_key(&self.name) == name_key(other)
    }

    pub fn to_ref(&self) -> PlayerRef {
        PlayerRef {
            name: self.name.clone(),
            register_by: self.register_by.clone(),
        }
    }
}

/// Identity part of a player, as carried by removal broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    pub name: String,
    pub register_by: String,
}

/// Normalised form used for case-insensitive name uniqueness.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One team and its players in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSlot {
    pub name: String,
    pub players: Vec<Player>,
}

impl TeamSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            players: Vec::new(),
        }
    }

    pub fn keeper(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_keeper)
    }
}

/// Ordered mapping team-name -> players.
///
/// Serialized as a JSON object whose key order is the team order, which is
/// the order viewers and notifications render teams in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Teams(Vec<TeamSlot>);

impl Teams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build an empty roster from team names. Duplicate names are dropped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut teams = Self::new();
        for name in names {
            teams.insert_team(name);
        }
        teams
    }

    /// Add an empty team if it is not present yet. Returns false on duplicates.
    pub fn insert_team(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push(TeamSlot::new(name));
        true
    }

    pub fn contains(&self, team: &str) -> bool {
        self.0.iter().any(|t| t.name == team)
    }

    pub fn get(&self, team: &str) -> Option<&TeamSlot> {
        self.0.iter().find(|t| t.name == team)
    }

    pub fn get_mut(&mut self, team: &str) -> Option<&mut TeamSlot> {
        self.0.iter_mut().find(|t| t.name == team)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamSlot> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every player of the event, across all teams.
    pub fn all_players(&self) -> impl Iterator<Item = (&str, &Player)> {
        self.0
            .iter()
            .flat_map(|t| t.players.iter().map(move |p| (t.name.as_str(), p)))
    }

    /// Locate a player by name (case-insensitive) in any team.
    pub fn find_player(&self, name: &str) -> Option<(&str, &Player)> {
        self.all_players().find(|(_, p)| p.same_name(name))
    }
}

impl Serialize for Teams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for slot in &self.0 {
            map.serialize_entry(&slot.name, &slot.players)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Teams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TeamsVisitor;

        impl<'de> Visitor<'de> for TeamsVisitor {
            type Value = Teams;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of team name to player list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Teams, A::Error> {
                let mut teams = Teams::new();
                while let Some((name, players)) = access.next_entry::<String, Vec<Player>>()? {
                    if teams.contains(&name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate team: {}",
                            name
                        )));
                    }
                    teams.0.push(TeamSlot { name, players });
                }
                Ok(teams)
            }
        }

        deserializer.deserialize_map(TeamsVisitor)
    }
}

/// Full event snapshot, as delivered to viewers on page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub date: DateTime<Utc>,
    pub description: String,
    pub address: Address,
    pub teams: Teams,
    /// Reserve team: uncapped and not eligible for the keeper rule.
    pub extra_team: String,
    #[serde(default)]
    pub status: EventStatus,
    pub team_limit: usize,
    /// Bumped by every committed roster mutation.
    #[serde(default)]
    pub version: u64,
}

impl Event {
    /// Playable teams count against `team_limit`; the reserve team does not.
    pub fn is_playable(&self, team: &str) -> bool {
        team != self.extra_team
    }

    pub fn is_closed(&self) -> bool {
        self.status == EventStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teams_serialize_in_insertion_order() {
        let mut teams = Teams::from_names(["Rojo", "Azul", "Suplentes"]);
        teams
            .get_mut("Azul")
            .unwrap()
            .players
            .push(Player::new("Ana", "acc-1", true));

        let json = serde_json::to_string(&teams).unwrap();
        assert_eq!(
            json,
            r#"{"Rojo":[],"Azul":[{"name":"Ana","registerBy":"acc-1","isKeeper":true}],"Suplentes":[]}"#
        );

        let back: Teams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.names().collect::<Vec<_>>(), ["Rojo", "Azul", "Suplentes"]);
        assert_eq!(back, teams);
    }

    #[test]
    fn teams_reject_duplicate_keys() {
        let json = r#"{"Rojo":[],"Rojo":[]}"#;
        assert!(serde_json::from_str::<Teams>(json).is_err());
    }

    #[test]
    fn keeper_flag_defaults_to_false() {
        let p: Player = serde_json::from_str(r#"{"name":"Leo","registerBy":"a"}"#).unwrap();
        assert!(!p.is_keeper);
    }

    #[test]
    fn find_player_ignores_case_and_padding() {
        let mut teams = Teams::from_names(["Rojo", "Azul"]);
        teams
            .get_mut("Azul")
            .unwrap()
            .players
            .push(Player::new("Ana", "acc-1", false));
        let (team, player) = teams.find_player("  aNa ").expect("found");
        assert_eq!(team, "Azul");
        assert_eq!(player.name, "Ana");
    }

    #[test]
    fn event_id_parse_rejects_garbage() {
        assert!(EventId::parse("short").is_none());
        assert!(EventId::parse("../../etc/passwd/aaaaaaaaaaaa").is_none());
        let id = EventId::new();
        assert_eq!(EventId::parse(id.as_str()), Some(id));
    }
}
