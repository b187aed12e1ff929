//! Interactions are modeled as a single sum type per the Design Note in
//! this design, rather than the class-hierarchy-of-interaction-kinds the source
//! ecosystem tends to reach for.

use crate::snowflake::Snowflake;
use serde::{
    de::{Deserialize, Deserializer, Error as DeError},
    ser::{Serialize, Serializer},
};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CommandData {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub options: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ComponentData {
    pub custom_id: String,
    pub component_type: u8,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModalSubmitData {
    pub custom_id: String,
    pub components: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AutocompleteData {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub options: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct InteractionFields {
    id: Snowflake,
    token: String,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    channel_id: Option<Snowflake>,
    data: Value,
}

/// A command-style RPC from a user to a bot, routed over the gateway,
/// requiring a reply via REST within three seconds.
///
/// Discord tags interactions with a numeric `type` (1 = ping, handled
/// upstream by the gateway layer and never surfaced here; 2-5 map onto the
/// variants below). Because the discriminant is a bare integer rather than
/// an internally-tagged string, this type carries its own `Deserialize`
/// impl instead of deriving one.
#[derive(Clone, Debug)]
pub enum Interaction {
    ApplicationCommand {
        id: Snowflake,
        token: String,
        guild_id: Option<Snowflake>,
        channel_id: Option<Snowflake>,
        data: CommandData,
    },
    MessageComponent {
        id: Snowflake,
        token: String,
        guild_id: Option<Snowflake>,
        channel_id: Option<Snowflake>,
        data: ComponentData,
    },
    Autocomplete {
        id: Snowflake,
        token: String,
        guild_id: Option<Snowflake>,
        data: AutocompleteData,
    },
    ModalSubmit {
        id: Snowflake,
        token: String,
        guild_id: Option<Snowflake>,
        data: ModalSubmitData,
    },
}

impl Interaction {
    pub const fn id(&self) -> Snowflake {
        match self {
            Self::ApplicationCommand { id,.. }
            | Self::MessageComponent { id,.. }
            | Self::Autocomplete { id,.. }
            | Self::ModalSubmit { id,.. } => *id,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::ApplicationCommand { token,.. }
            | Self::MessageComponent { token,.. }
            | Self::Autocomplete { token,.. }
            | Self::ModalSubmit { token,.. } => token,
        }
    }
}

impl<'de> Deserialize<'de> for Interaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let kind = value
.get("type")
.and_then(Value::as_u64)
.ok_or_else(|| DeError::custom("interaction missing numeric `type`"))?;

        let fields: InteractionFields =
            serde_json::from_value(value.take()).map_err(DeError::custom)?;

        Ok(match kind {
            2 => Self::ApplicationCommand {
                id: fields.id,
                token: fields.token,
                guild_id: fields.guild_id,
                channel_id: fields.channel_id,
                data: serde_json::from_value(fields.data).map_err(DeError::custom)?,
            },
            3 => Self::MessageComponent {
                id: fields.id,
                token: fields.token,
                guild_id: fields.guild_id,
                channel_id: fields.channel_id,
                data: serde_json::from_value(fields.data).map_err(DeError::custom)?,
            },
            4 => Self::Autocomplete {
                id: fields.id,
                token: fields.token,
                guild_id: fields.guild_id,
                data: serde_json::from_value(fields.data).map_err(DeError::custom)?,
            },
            5 => Self::ModalSubmit {
                id: fields.id,
                token: fields.token,
                guild_id: fields.guild_id,
                data: serde_json::from_value(fields.data).map_err(DeError::custom)?,
            },
            other => return Err(DeError::custom(format!("unsupported interaction type {other}"))),
        })
    }
}

impl Serialize for Interaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;

        match self {
            Self::ApplicationCommand {
                id,
                token,
                guild_id,
                channel_id,
                data,
            } => {
                map.serialize_entry("type", &2)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("token", token)?;
                map.serialize_entry("guild_id", guild_id)?;
                map.serialize_entry("channel_id", channel_id)?;
                map.serialize_entry("data", data)?;
            }
            Self::MessageComponent {
                id,
                token,
                guild_id,
                channel_id,
                data,
            } => {
                map.serialize_entry("type", &3)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("token", token)?;
                map.serialize_entry("guild_id", guild_id)?;
                map.serialize_entry("channel_id", channel_id)?;
                map.serialize_entry("data", data)?;
            }
            Self::Autocomplete {
                id,
                token,
                guild_id,
                data,
            } => {
                map.serialize_entry("type", &4)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("token", token)?;
                map.serialize_entry("guild_id", guild_id)?;
                map.serialize_entry("data", data)?;
            }
            Self::ModalSubmit {
                id,
                token,
                guild_id,
                data,
            } => {
                map.serialize_entry("type", &5)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("token", token)?;
                map.serialize_entry("guild_id", guild_id)?;
                map.serialize_entry("data", data)?;
            }
        }

        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::Interaction;

    #[test]
    fn application_command_parses_by_numeric_type() {
        let json = serde_json::json!({
            "type": 2,
            "id": "123",
            "token": "tok",
            "guild_id": "456",
            "channel_id": "789",
            "data": {"id": "1", "name": "ping", "options": []},
        });

        let interaction: Interaction = serde_json::from_value(json).unwrap();
        assert!(matches!(interaction, Interaction::ApplicationCommand {.. }));
        assert_eq!(interaction.token(), "tok");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = serde_json::json!({"type": 99, "id": "1", "token": "t", "data": {}});
        assert!(serde_json::from_value::<Interaction>(json).is_err());
    }
}
