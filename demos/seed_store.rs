use std::sync::Arc;

use npc_studio::{FileMedium, NpcStore, StoredNpc};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=== NPC Studio Store Example ===\n");

    let store = NpcStore::new(Arc::new(FileMedium::new("data/npcs.json")));

    let aldric = store
        .create(&json!({
            "name": "Aldric",
            "role": "Merchant",
            "persona": {
                "backstory": "Former caravan guard turned trader",
                "goals": "Earn enough to retire by the coast"
            },
            "rules": {
                "do_not": ["reveal the smuggling route"],
                "spoiler_policy": "deflect questions about the heist"
            },
            "capabilities": {
                "allowed_gestures": ["nod", "wave"],
                "allowed_actions": ["give_item", "start_quest"]
            },
            "lore_facts": ["Knows every toll keeper on the east road"]
        }))
        .await?;
    println!("Created {} the {} ({})", aldric.name, aldric.role, aldric.id);

    let mira = store
        .create(&json!({ "name": "Mira", "role": "Gate Guard" }))
        .await?;
    println!("Created {} the {} ({})", mira.name, mira.role, mira.id);

    // Partial update: only the supplied persona key changes.
    store
        .update(&mira.id, &json!({ "persona": { "voice_style": "clipped, formal" } }))
        .await?;

    println!("\nAll NPCs:");
    for record in store.list_all().await? {
        match record {
            StoredNpc::Valid(npc) => {
                println!("- {} ({}), updated {}", npc.name, npc.role, npc.updated_at)
            }
            StoredNpc::Legacy(raw) => println!("- legacy record: {}", raw),
        }
    }

    Ok(())
}
