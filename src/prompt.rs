/// Instruction attached to the seed turn alongside the uploaded diagram.
pub const SEED_INSTRUCTION: &str =
    "You are an intelligent system. I am going to provide an Entity relationship diagram. \
     You need to read that diagram and develop a BigQuery script using that. \
     Use temp tables to store the joined table results. \
     In one temp table do not have more than 3 tables joined. \
     Create a separate table to store more than 3 tables join. \
     Subsequently use the temp tables created and form the logic.";

/// Follow-up sent automatically in script-only mode instead of waiting for chat input.
pub const SCRIPT_FOLLOW_UP: &str =
    "Use the uploaded diagram and its annotations to produce the script.";
