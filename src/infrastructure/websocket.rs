//! WebSocket handler for director and player connections
//!
//! The transport stays thin: parse the client message, gate on role,
//! delegate to the encounter service, and reply. Accepted intents reach
//! the client through the broadcast hub as ordered deltas; only
//! rejections and join/resync responses are sent directly.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::application::dto::AddCombatantSpec;
use crate::domain::aggregates::EncounterState;
use crate::domain::entities::{Ability, TargetScope};
use crate::domain::errors::{Blocker, EngineError};
use crate::domain::events::DeltaEvent;
use crate::domain::value_objects::{
    AdvantageMode, CombatModifier, CombatantId, CoverTier, EncounterId, PromptId, RestKind,
    SpellId,
};
use crate::infrastructure::hub::{ClientId, HubError};
use crate::infrastructure::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let client_id = ClientId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    tracing::info!("New WebSocket connection established: {}", client_id);

    // Forward messages from the channel to the WebSocket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if let Some(response) =
                        handle_message(msg, &state, client_id, tx.clone()).await
                    {
                        if tx.send(response).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse message: {}", e);
                    let error = ServerMessage::Error {
                        code: "PARSE_ERROR".to_string(),
                        message: format!("Invalid message format: {}", e),
                    };
                    if tx.send(error).is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("WebSocket connection closed by client: {}", client_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                let _ = tx.send(ServerMessage::Pong);
            }
            Err(e) => {
                tracing::error!("WebSocket error for client {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up the subscription.
    if let Some(encounter_id) = state.engine.hub().unsubscribe(client_id).await {
        tracing::info!(
            "Client {} disconnected from encounter {}",
            client_id,
            encounter_id
        );
    }
    send_task.abort();

    tracing::info!("WebSocket connection terminated: {}", client_id);
}

/// Handle a parsed client message
async fn handle_message(
    msg: ClientMessage,
    state: &AppState,
    client_id: ClientId,
    sender: mpsc::UnboundedSender<ServerMessage>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Heartbeat => Some(ServerMessage::Pong),

        ClientMessage::CreateEncounter { name } => {
            let encounter_id = state.engine.create_encounter(&name).await;
            Some(ServerMessage::EncounterCreated { encounter_id })
        }

        ClientMessage::JoinEncounter {
            encounter_id,
            user_id,
            role,
        } => {
            let sequence = match state
                .engine
                .hub()
                .subscribe(encounter_id, client_id, user_id.clone(), role, sender)
                .await
            {
                Ok(sequence) => sequence,
                Err(HubError::ChannelNotFound(_)) => {
                    return Some(ServerMessage::Error {
                        code: "ENCOUNTER_NOT_FOUND".to_string(),
                        message: format!("Encounter {} not found", encounter_id),
                    });
                }
                Err(HubError::DirectorAlreadyPresent) => {
                    return Some(ServerMessage::Error {
                        code: "DIRECTOR_ALREADY_PRESENT".to_string(),
                        message: "Encounter already has a director".to_string(),
                    });
                }
            };

            match state.engine.get_snapshot(encounter_id).await {
                Ok((snapshot, snapshot_sequence)) => Some(ServerMessage::EncounterJoined {
                    encounter_id,
                    role,
                    sequence: snapshot_sequence.max(sequence),
                    snapshot: Box::new(snapshot),
                }),
                Err(e) => Some(engine_error_reply(e)),
            }
        }

        ClientMessage::AddCombatant { spec } => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(state.engine.add_combatant(encounter_id, spec).await)
        }

        ClientMessage::StartEncounter => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(state.engine.start_encounter(encounter_id).await)
        }

        ClientMessage::PauseEncounter => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(state.engine.pause_encounter(encounter_id).await)
        }

        ClientMessage::ResumeEncounter => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(state.engine.resume_encounter(encounter_id).await)
        }

        ClientMessage::EndEncounter => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(state.engine.end_encounter(encounter_id).await)
        }

        ClientMessage::AdvanceTurn => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(state.engine.advance_turn(encounter_id).await)
        }

        ClientMessage::RollAttack {
            attacker_id,
            target_id,
            target_ac,
            advantage,
            cover,
        } => {
            let encounter_id = match require_encounter(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .roll_attack(
                        encounter_id,
                        attacker_id,
                        target_id,
                        target_ac,
                        advantage,
                        cover,
                    )
                    .await,
            )
        }

        ClientMessage::CastSpell {
            caster_id,
            spell_id,
            cast_level,
        } => {
            let encounter_id = match require_encounter(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            match state
                .engine
                .cast_spell(encounter_id, caster_id, spell_id, cast_level)
                .await
            {
                Ok(_) => None,
                Err(e) => Some(engine_error_reply(e)),
            }
        }

        ClientMessage::ApplyDamage {
            target_id,
            amount,
            damage_type,
        } => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .apply_damage(encounter_id, target_id, amount, &damage_type)
                    .await,
            )
        }

        ClientMessage::ApplyHealing { target_id, amount } => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .apply_healing(encounter_id, target_id, amount)
                    .await,
            )
        }

        ClientMessage::AddModifier {
            combatant_id,
            modifier,
        } => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .add_modifier(encounter_id, combatant_id, modifier)
                    .await,
            )
        }

        ClientMessage::TakeRest { combatant_id, rest } => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .take_rest(encounter_id, combatant_id, rest)
                    .await,
            )
        }

        ClientMessage::PromptSave {
            ability,
            dc,
            scope,
            advantage,
        } => {
            let encounter_id = match require_director(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .prompt_save(encounter_id, ability, dc, scope, advantage)
                    .await,
            )
        }

        ClientMessage::SubmitSaveResponse {
            prompt_id,
            combatant_id,
            success,
        } => {
            let encounter_id = match require_encounter(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            reply_on_error(
                state
                    .engine
                    .record_save_response(encounter_id, prompt_id, combatant_id, success)
                    .await,
            )
        }

        ClientMessage::RequestSnapshot => {
            let encounter_id = match require_encounter(state, client_id).await {
                Ok(id) => id,
                Err(reply) => return Some(reply),
            };
            match state.engine.get_snapshot(encounter_id).await {
                Ok((snapshot, sequence)) => Some(ServerMessage::Snapshot {
                    encounter_id,
                    sequence,
                    snapshot: Box::new(snapshot),
                }),
                Err(e) => Some(engine_error_reply(e)),
            }
        }
    }
}

/// The client's encounter, or an error reply if it never joined one.
async fn require_encounter(
    state: &AppState,
    client_id: ClientId,
) -> Result<EncounterId, ServerMessage> {
    match state.engine.hub().client_encounter(client_id).await {
        Some(encounter_id) => Ok(encounter_id),
        None => {
            tracing::warn!("Client {} sent an intent without joining", client_id);
            Err(ServerMessage::Error {
                code: "NOT_IN_ENCOUNTER".to_string(),
                message: "You must join an encounter before sending intents".to_string(),
            })
        }
    }
}

/// Director-gated intents also check the subscriber's role.
async fn require_director(
    state: &AppState,
    client_id: ClientId,
) -> Result<EncounterId, ServerMessage> {
    let encounter_id = require_encounter(state, client_id).await?;
    if state.engine.hub().is_director(client_id).await {
        Ok(encounter_id)
    } else {
        tracing::warn!("Client {} attempted a director-only intent", client_id);
        Err(ServerMessage::Error {
            code: "NOT_AUTHORIZED".to_string(),
            message: "Only the director can issue this intent".to_string(),
        })
    }
}

/// Accepted intents answer through the delta stream; only errors get a
/// direct reply.
fn reply_on_error(result: Result<DeltaEvent, EngineError>) -> Option<ServerMessage> {
    match result {
        Ok(_) => None,
        Err(e) => Some(engine_error_reply(e)),
    }
}

/// Map an engine error onto the wire taxonomy.
fn engine_error_reply(error: EngineError) -> ServerMessage {
    match error {
        EngineError::Blocked(blockers) => ServerMessage::IntentRejected {
            code: "INTENT_BLOCKED".to_string(),
            message: "The intent violates a combat rule".to_string(),
            blockers,
            retryable: false,
        },
        other => {
            let retryable = other.is_retryable();
            ServerMessage::IntentRejected {
                code: other.code().to_string(),
                message: other.to_string(),
                blockers: Vec::new(),
                retryable,
            }
        }
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Messages from client to engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Create a fresh encounter in the preparing state
    CreateEncounter { name: String },
    /// Subscribe to an encounter's delta stream
    JoinEncounter {
        encounter_id: EncounterId,
        user_id: String,
        role: ParticipantRole,
    },
    /// Director adds a combatant while preparing
    AddCombatant { spec: AddCombatantSpec },
    /// Director starts the encounter
    StartEncounter,
    /// Director pauses the encounter
    PauseEncounter,
    /// Director resumes a paused encounter
    ResumeEncounter,
    /// Director ends the encounter
    EndEncounter,
    /// Director advances to the next turn
    AdvanceTurn,
    /// Resolve a to-hit roll; a named target contributes its cover tags
    RollAttack {
        attacker_id: CombatantId,
        #[serde(default)]
        target_id: Option<CombatantId>,
        target_ac: i32,
        advantage: AdvantageMode,
        cover: CoverTier,
    },
    /// Cast a spell using a slot of the given level
    CastSpell {
        caster_id: CombatantId,
        spell_id: SpellId,
        cast_level: u8,
    },
    /// Director applies damage to a combatant
    ApplyDamage {
        target_id: CombatantId,
        amount: i32,
        damage_type: String,
    },
    /// Director applies healing to a combatant
    ApplyHealing { target_id: CombatantId, amount: i32 },
    /// Director attaches a modifier tag
    AddModifier {
        combatant_id: CombatantId,
        modifier: CombatModifier,
    },
    /// Director applies a short or long rest to a combatant
    TakeRest {
        combatant_id: CombatantId,
        rest: RestKind,
    },
    /// Director requests a group saving throw
    PromptSave {
        ability: Ability,
        dc: i32,
        scope: TargetScope,
        advantage: AdvantageMode,
    },
    /// A combatant's save result
    SubmitSaveResponse {
        prompt_id: PromptId,
        combatant_id: CombatantId,
        success: bool,
    },
    /// Full-state resync after a detected sequence gap
    RequestSnapshot,
    /// Heartbeat ping
    Heartbeat,
}

/// Messages from engine to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A new encounter was created
    EncounterCreated { encounter_id: EncounterId },
    /// Subscription confirmed with the full state to resume from
    EncounterJoined {
        encounter_id: EncounterId,
        role: ParticipantRole,
        sequence: u64,
        snapshot: Box<EncounterState>,
    },
    /// Full-state resync response
    Snapshot {
        encounter_id: EncounterId,
        sequence: u64,
        snapshot: Box<EncounterState>,
    },
    /// Ordered state change, fanned out to every subscriber
    Delta { event: DeltaEvent },
    /// Intent refused; blockers enumerate the rules that failed
    IntentRejected {
        code: String,
        message: String,
        blockers: Vec<Blocker>,
        retryable: bool,
    },
    /// Transport-level error
    Error { code: String, message: String },
    /// Heartbeat response
    Pong,
}

/// Participant role in the encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    Director,
    Player,
    Spectator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_round_trip() {
        let msg = ClientMessage::RollAttack {
            attacker_id: CombatantId::new(),
            target_id: None,
            target_ac: 15,
            advantage: AdvantageMode::Advantage,
            cover: CoverTier::Half,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"RollAttack\""));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ClientMessage::RollAttack { target_ac: 15, .. }));
    }

    #[test]
    fn test_cast_spell_message_shape() {
        let json = format!(
            r#"{{"type":"CastSpell","caster_id":"{}","spell_id":"{}","cast_level":3}}"#,
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::CastSpell { cast_level: 3, .. }));
    }

    #[test]
    fn test_rejection_carries_structured_blockers() {
        let reply = engine_error_reply(EngineError::Blocked(vec![
            Blocker::SecondLeveledSpell,
        ]));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "IntentRejected");
        assert_eq!(json["blockers"][0]["reason"], "second_leveled_spell");
        assert_eq!(json["retryable"], false);
    }

    #[test]
    fn test_retryable_errors_are_flagged() {
        let reply = engine_error_reply(EngineError::Conflict { attempts: 3 });
        match reply {
            ServerMessage::IntentRejected {
                code, retryable, ..
            } => {
                assert_eq!(code, "CONCURRENCY_CONFLICT");
                assert!(retryable);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}
