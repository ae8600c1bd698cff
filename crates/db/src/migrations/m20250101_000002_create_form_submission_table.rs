//! Create form_submission table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FormSubmission::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormSubmission::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FormSubmission::FormId).string().not_null())
                    .col(ColumnDef::new(FormSubmission::Data).json_binary().not_null())
                    .col(ColumnDef::new(FormSubmission::SubmittedByName).string().null())
                    .col(ColumnDef::new(FormSubmission::SubmittedByEmail).string().null())
                    .col(ColumnDef::new(FormSubmission::SubmittedByPhone).string().null())
                    .col(ColumnDef::new(FormSubmission::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(FormSubmission::DedupeKey).string().null())
                    .col(
                        ColumnDef::new(FormSubmission::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_form_submission_form")
                            .from(FormSubmission::Table, FormSubmission::FormId)
                            .to(Form::Table, Form::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_submission_form_id")
                    .table(FormSubmission::Table)
                    .col(FormSubmission::FormId)
                    .to_owned(),
            )
            .await?;

        // NULL dedupe keys never collide, so only single-submission forms are constrained
        manager
            .create_index(
                Index::create()
                    .name("idx_form_submission_dedupe_unique")
                    .table(FormSubmission::Table)
                    .col(FormSubmission::FormId)
                    .col(FormSubmission::DedupeKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_submission_created_at")
                    .table(FormSubmission::Table)
                    .col(FormSubmission::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FormSubmission::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FormSubmission {
    Table,
    Id,
    FormId,
    Data,
    SubmittedByName,
    SubmittedByEmail,
    SubmittedByPhone,
    IpAddress,
    DedupeKey,
    CreatedAt,
}

#[derive(Iden)]
enum Form {
    Table,
    Id,
}
