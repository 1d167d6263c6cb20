// Mirrors the tables created in schema.rs.

diesel::table! {
    users (id) {
        id -> Text,
        username -> Text,
    }
}

diesel::table! {
    questions (id) {
        id -> Text,
        text -> Text,
    }
}

diesel::table! {
    signatures (id) {
        id -> Text,
        owner_id -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    answers (id) {
        id -> Text,
        question_id -> Text,
        text -> Text,
        signature_id -> Text,
    }
}

diesel::joinable!(answers -> questions (question_id));
diesel::joinable!(answers -> signatures (signature_id));
diesel::joinable!(signatures -> users (owner_id));

diesel::allow_tables_to_appear_in_same_query!(answers, questions, signatures, users,);
