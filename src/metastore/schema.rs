table! {
    file_meta (id) {
        id -> Uuid,
        filename -> Text,
        extension -> Text,
        path -> Text,
        size -> Int8,
        comment -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Nullable<Timestamptz>,
    }
}
