//! Create form table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Form::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Form::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Form::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Form::Slug).string_len(255).not_null())
                    .col(ColumnDef::new(Form::Description).text().null())
                    .col(ColumnDef::new(Form::Thumbnail).string().null())
                    .col(ColumnDef::new(Form::Fields).json_binary().not_null())
                    .col(
                        ColumnDef::new(Form::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Form::AllowMultipleSubmissions)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Form::IsAnonymous)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Form::SubmissionLimit).integer().null())
                    .col(
                        ColumnDef::new(Form::SubmissionCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Form::StartDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Form::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Form::Redirect).text().null())
                    .col(
                        ColumnDef::new(Form::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Form::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Form::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Slugs stay unique across trashed forms so a restore cannot collide
        manager
            .create_index(
                Index::create()
                    .name("idx_form_slug_unique")
                    .table(Form::Table)
                    .col(Form::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_created_at")
                    .table(Form::Table)
                    .col(Form::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Form::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Form {
    Table,
    Id,
    Title,
    Slug,
    Description,
    Thumbnail,
    Fields,
    IsActive,
    AllowMultipleSubmissions,
    IsAnonymous,
    SubmissionLimit,
    SubmissionCount,
    StartDate,
    EndDate,
    Redirect,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
