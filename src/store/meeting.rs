/*
 * src/store/meeting.rs
 *
 * File for the Meeting Store
 *
 * Purpose:
 *   Upsert meetings and their 1:1 MeetingInfo row, maintain the
 *   meeting_formats join table, and recompute the full-text search vector.
 *   Meetings missing from a root's latest fetch are soft-deleted rather than
 *   removed outright. Import-path functions take a `PgConnection` so the
 *   orchestrator can run a whole root inside one transaction; the query
 *   surface reads through the shared pool.
 */

use chrono::NaiveTime;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::fieldmap::records::{MeetingFormat, MeetingRecord};
use crate::models::{Meeting, MeetingInfo, RootServer, ServiceBody};
use crate::normalize::meeting::{CanonicalMeeting, CanonicalMeetingInfo};
use crate::normalize::naws_row::CanonicalNawsMeeting;
use crate::query::geospatial::{haversine_km_expr, GeoMode};
use crate::query::plan::{FilterPlan, FormatsOp};
use crate::store::Patch;
use crate::translation::Cache;

const MEETING_COLUMNS: &str = "id, source_id, root_server_id, service_body_id, name, weekday, venue_type, \
     start_time, duration_minutes, language, latitude::double precision AS latitude, \
     longitude::double precision AS longitude, published, deleted";

/// Loads the current row by (root, source_id), diffs the canonical record
/// against it, and issues an UPDATE only when a field actually changed —
/// re-importing an unchanged snapshot writes nothing.
pub async fn upsert(
    conn: &mut PgConnection,
    root_server_id: i64,
    service_body_id: i64,
    meeting: &CanonicalMeeting,
) -> Result<Meeting, sqlx::Error> {
    let existing = sqlx::query_as::<_, Meeting>(&format!(
        "SELECT {MEETING_COLUMNS} FROM meetings WHERE root_server_id = $1 AND source_id = $2",
    ))
    .bind(root_server_id)
    .bind(meeting.source_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(current) = existing else {
        return sqlx::query_as::<_, Meeting>(&format!(
            r#"
            INSERT INTO meetings (
                source_id, root_server_id, service_body_id, name, weekday, venue_type,
                start_time, duration_minutes, language, latitude, longitude, published, deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, FALSE)
            RETURNING {MEETING_COLUMNS}
            "#,
        ))
        .bind(meeting.source_id)
        .bind(root_server_id)
        .bind(service_body_id)
        .bind(&meeting.name)
        .bind(meeting.weekday)
        .bind(&meeting.venue_type)
        .bind(meeting.start_time)
        .bind(meeting.duration_minutes)
        .bind(&meeting.language)
        .bind(meeting.latitude)
        .bind(meeting.longitude)
        .bind(meeting.published)
        .fetch_one(conn)
        .await;
    };

    let mut patch = Patch::new();
    let next = Meeting {
        id: current.id,
        source_id: current.source_id,
        root_server_id: current.root_server_id,
        service_body_id: patch.set_if_changed(&current.service_body_id, service_body_id),
        name: patch.set_if_changed(&current.name, meeting.name.clone()),
        weekday: patch.set_if_changed(&current.weekday, meeting.weekday),
        venue_type: patch.set_if_changed(&current.venue_type, meeting.venue_type.clone()),
        start_time: patch.set_if_changed(&current.start_time, meeting.start_time),
        duration_minutes: patch.set_if_changed(&current.duration_minutes, meeting.duration_minutes),
        language: patch.set_if_changed(&current.language, meeting.language.clone()),
        latitude: patch.set_if_changed(&current.latitude, meeting.latitude),
        longitude: patch.set_if_changed(&current.longitude, meeting.longitude),
        published: patch.set_if_changed(&current.published, meeting.published),
        deleted: patch.set_if_changed(&current.deleted, false),
    };
    if !patch.dirty() {
        return Ok(current);
    }

    sqlx::query(
        r#"
        UPDATE meetings SET service_body_id = $2, name = $3, weekday = $4, venue_type = $5,
            start_time = $6, duration_minutes = $7, language = $8, latitude = $9, longitude = $10,
            published = $11, deleted = $12
        WHERE id = $1
        "#,
    )
    .bind(next.id)
    .bind(next.service_body_id)
    .bind(&next.name)
    .bind(next.weekday)
    .bind(&next.venue_type)
    .bind(next.start_time)
    .bind(next.duration_minutes)
    .bind(&next.language)
    .bind(next.latitude)
    .bind(next.longitude)
    .bind(next.published)
    .bind(next.deleted)
    .execute(conn)
    .await?;
    Ok(next)
}

/// A meeting arriving only through the supplementary NAWS dump: not present
/// in the primary list, so it lands unpublished (or soft-deleted when the
/// dump says so) and never shadows a primary row.
pub async fn insert_from_naws(
    conn: &mut PgConnection,
    root_server_id: i64,
    service_body_id: i64,
    row: &CanonicalNawsMeeting,
) -> Result<Option<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>(
        r#"
        INSERT INTO meetings (
            source_id, root_server_id, service_body_id, name, weekday,
            start_time, language, latitude, longitude, published, deleted
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, $10)
        ON CONFLICT (root_server_id, source_id) DO NOTHING
        RETURNING id, source_id, root_server_id, service_body_id, name, weekday, venue_type,
                  start_time, duration_minutes, language, latitude, longitude, published, deleted
        "#,
    )
    .bind(row.bmlt_id)
    .bind(root_server_id)
    .bind(service_body_id)
    .bind(&row.name)
    .bind(row.weekday)
    .bind(row.start_time)
    .bind(&row.language)
    .bind(row.latitude)
    .bind(row.longitude)
    .bind(row.deleted)
    .fetch_optional(conn)
    .await
}

/// Ensures the 1:1 info row exists, then applies the same diff-before-write
/// discipline as [`upsert`].
pub async fn upsert_info(
    conn: &mut PgConnection,
    meeting_id: i64,
    info: &CanonicalMeetingInfo,
) -> Result<(), sqlx::Error> {
    let existing =
        sqlx::query_as::<_, MeetingInfo>("SELECT * FROM meeting_info WHERE meeting_id = $1")
            .bind(meeting_id)
            .fetch_optional(&mut *conn)
            .await?;

    let current = match existing {
        Some(row) => row,
        None => {
            sqlx::query("INSERT INTO meeting_info (meeting_id) VALUES ($1)")
                .bind(meeting_id)
                .execute(&mut *conn)
                .await?;
            MeetingInfo { meeting_id, ..MeetingInfo::default() }
        }
    };

    let mut patch = Patch::new();
    let next = MeetingInfo {
        meeting_id,
        email: patch.set_if_changed(&current.email, info.email.clone()),
        location_text: patch.set_if_changed(&current.location_text, info.location_text.clone()),
        location_info: patch.set_if_changed(&current.location_info, info.location_info.clone()),
        location_street: patch.set_if_changed(&current.location_street, info.location_street.clone()),
        location_city_subsection: patch
            .set_if_changed(&current.location_city_subsection, info.location_city_subsection.clone()),
        location_neighborhood: patch.set_if_changed(&current.location_neighborhood, info.location_neighborhood.clone()),
        location_municipality: patch.set_if_changed(&current.location_municipality, info.location_municipality.clone()),
        location_sub_province: patch.set_if_changed(&current.location_sub_province, info.location_sub_province.clone()),
        location_province: patch.set_if_changed(&current.location_province, info.location_province.clone()),
        location_postal_code_1: patch.set_if_changed(&current.location_postal_code_1, info.location_postal_code_1.clone()),
        location_nation: patch.set_if_changed(&current.location_nation, info.location_nation.clone()),
        train_lines: patch.set_if_changed(&current.train_lines, info.train_lines.clone()),
        bus_lines: patch.set_if_changed(&current.bus_lines, info.bus_lines.clone()),
        world_id: patch.set_if_changed(&current.world_id, info.world_id.clone()),
        comments: patch.set_if_changed(&current.comments, info.comments.clone()),
        virtual_meeting_link: patch.set_if_changed(&current.virtual_meeting_link, info.virtual_meeting_link.clone()),
        phone_meeting_number: patch.set_if_changed(&current.phone_meeting_number, info.phone_meeting_number.clone()),
        virtual_meeting_additional_info: patch
            .set_if_changed(&current.virtual_meeting_additional_info, info.virtual_meeting_additional_info.clone()),
    };
    if !patch.dirty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE meeting_info SET
            email = $2, location_text = $3, location_info = $4, location_street = $5,
            location_city_subsection = $6, location_neighborhood = $7, location_municipality = $8,
            location_sub_province = $9, location_province = $10, location_postal_code_1 = $11,
            location_nation = $12, train_lines = $13, bus_lines = $14, world_id = $15, comments = $16,
            virtual_meeting_link = $17, phone_meeting_number = $18, virtual_meeting_additional_info = $19
        WHERE meeting_id = $1
        "#,
    )
    .bind(meeting_id)
    .bind(&next.email)
    .bind(&next.location_text)
    .bind(&next.location_info)
    .bind(&next.location_street)
    .bind(&next.location_city_subsection)
    .bind(&next.location_neighborhood)
    .bind(&next.location_municipality)
    .bind(&next.location_sub_province)
    .bind(&next.location_province)
    .bind(&next.location_postal_code_1)
    .bind(&next.location_nation)
    .bind(&next.train_lines)
    .bind(&next.bus_lines)
    .bind(&next.world_id)
    .bind(&next.comments)
    .bind(&next.virtual_meeting_link)
    .bind(&next.phone_meeting_number)
    .bind(&next.virtual_meeting_additional_info)
    .execute(conn)
    .await?;
    Ok(())
}

/// Replaces the meeting's format set only when it differs from the stored
/// one, keeping an unchanged upstream snapshot write-free.
pub async fn link_formats(
    conn: &mut PgConnection,
    meeting_id: i64,
    format_ids: &[i64],
) -> Result<(), sqlx::Error> {
    let current: Vec<(i64,)> =
        sqlx::query_as("SELECT format_id FROM meeting_formats WHERE meeting_id = $1 ORDER BY format_id")
            .bind(meeting_id)
            .fetch_all(&mut *conn)
            .await?;
    let mut desired: Vec<i64> = format_ids.to_vec();
    desired.sort_unstable();
    desired.dedup();
    if current.iter().map(|(id,)| *id).eq(desired.iter().copied()) {
        return Ok(());
    }

    sqlx::query("DELETE FROM meeting_formats WHERE meeting_id = $1")
        .bind(meeting_id)
        .execute(&mut *conn)
        .await?;
    for format_id in desired {
        sqlx::query("INSERT INTO meeting_formats (meeting_id, format_id) VALUES ($1, $2)")
            .bind(meeting_id)
            .bind(format_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Recomputes `search_vector` over the twelve name/location/comment fields
/// `SearchString` matches against. The `IS DISTINCT FROM` guard
/// keeps an unchanged snapshot write-free, same as the upsert diffing.
pub async fn refresh_search_vector(conn: &mut PgConnection, meeting_id: i64) -> Result<(), sqlx::Error> {
    const VECTOR_EXPR: &str = r#"
        setweight(to_tsvector('simple', coalesce(m.name, '')), 'A') ||
        setweight(to_tsvector('simple',
            concat_ws(' ',
                mi.location_text, mi.location_info, mi.location_street,
                mi.location_city_subsection, mi.location_neighborhood, mi.location_municipality,
                mi.location_sub_province, mi.location_province, mi.location_postal_code_1,
                mi.location_nation)), 'B') ||
        setweight(to_tsvector('simple', coalesce(mi.comments, '')), 'C')
    "#;
    sqlx::query(&format!(
        r#"
        UPDATE meetings m
        SET search_vector = {VECTOR_EXPR}
        FROM meeting_info mi
        WHERE mi.meeting_id = m.id AND m.id = $1
          AND m.search_vector IS DISTINCT FROM ({VECTOR_EXPR})
        "#,
    ))
    .bind(meeting_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Soft-deletes every meeting for a root server whose `source_id` was absent
/// from the latest fetch.
pub async fn mark_missing_deleted(
    conn: &mut PgConnection,
    root_server_id: i64,
    current_source_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE meetings SET deleted = TRUE WHERE root_server_id = $1 AND NOT (source_id = ANY($2)) AND deleted = FALSE",
    )
    .bind(root_server_id)
    .bind(current_source_ids)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// The source ids already present for a root, used by the NAWS merge to
/// skip rows the primary list has covered (primary wins).
pub async fn source_ids_for_root(
    conn: &mut PgConnection,
    root_server_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT source_id FROM meetings WHERE root_server_id = $1")
        .bind(root_server_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Average position across every published, geolocated meeting, used for
/// `GetServerInfo`'s `center` descriptor.
pub async fn centroid(pool: &PgPool) -> Result<Option<(f64, f64)>, sqlx::Error> {
    let row: (Option<f64>, Option<f64>) = sqlx::query_as(
        "SELECT avg(latitude)::double precision, avg(longitude)::double precision FROM meetings \
         WHERE published = TRUE AND deleted = FALSE AND latitude IS NOT NULL AND longitude IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;
    Ok(match row {
        (Some(lat), Some(lon)) => Some((lat, lon)),
        _ => None,
    })
}

/// One row of a search result: the meeting, its joined info/service
/// body/root server columns flattened, its format ids and world ids, and
/// (when a geospatial filter is active) its distance from the query point
/// in kilometers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MeetingSearchRow {
    pub id: i64,
    pub source_id: i64,
    pub root_server_id: i64,
    pub root_server_url: String,
    pub service_body_id: i64,
    pub service_body_source_id: i64,
    pub service_body_name: String,
    pub service_body_type: Option<String>,
    pub service_body_parent_id: Option<i64>,
    pub service_body_world_id: Option<String>,
    pub name: String,
    pub weekday: i16,
    pub venue_type: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub language: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub published: bool,
    pub deleted: bool,
    pub email: Option<String>,
    pub location_text: Option<String>,
    pub location_info: Option<String>,
    pub location_street: Option<String>,
    pub location_city_subsection: Option<String>,
    pub location_neighborhood: Option<String>,
    pub location_municipality: Option<String>,
    pub location_sub_province: Option<String>,
    pub location_province: Option<String>,
    pub location_postal_code_1: Option<String>,
    pub location_nation: Option<String>,
    pub train_lines: Option<String>,
    pub bus_lines: Option<String>,
    pub info_world_id: Option<String>,
    pub comments: Option<String>,
    pub virtual_meeting_link: Option<String>,
    pub phone_meeting_number: Option<String>,
    pub virtual_meeting_additional_info: Option<String>,
    pub format_ids: Option<Vec<i64>>,
    pub format_world_ids: Option<Vec<String>>,
    pub distance_km: Option<f64>,
}

impl MeetingSearchRow {
    /// Builds the projection record the field maps read from. Format key
    /// strings come from the translation cache in the requested language
    /// with English fallback — the computed path is the normative one.
    pub fn into_record(self, cache: &Cache, language: &str) -> MeetingRecord {
        let format_ids = self.format_ids.clone().unwrap_or_default();
        let format_world_ids = self.format_world_ids.clone().unwrap_or_default();
        let formats = format_ids
            .into_iter()
            .zip(format_world_ids.into_iter().map(|w| if w.is_empty() { None } else { Some(w) }))
            .filter_map(|(format_id, world_id)| {
                cache.lookup_with_fallback(format_id, language).map(|tf| MeetingFormat {
                    format_id,
                    key_string: tf.key_string.clone(),
                    world_id,
                })
            })
            .collect();

        MeetingRecord {
            meeting: Meeting {
                id: self.id,
                source_id: self.source_id,
                root_server_id: self.root_server_id,
                service_body_id: self.service_body_id,
                name: self.name,
                weekday: self.weekday,
                venue_type: self.venue_type,
                start_time: self.start_time,
                duration_minutes: self.duration_minutes,
                language: self.language,
                latitude: self.latitude,
                longitude: self.longitude,
                published: self.published,
                deleted: self.deleted,
            },
            info: MeetingInfo {
                meeting_id: self.id,
                email: self.email,
                location_text: self.location_text,
                location_info: self.location_info,
                location_street: self.location_street,
                location_city_subsection: self.location_city_subsection,
                location_neighborhood: self.location_neighborhood,
                location_municipality: self.location_municipality,
                location_sub_province: self.location_sub_province,
                location_province: self.location_province,
                location_postal_code_1: self.location_postal_code_1,
                location_nation: self.location_nation,
                train_lines: self.train_lines,
                bus_lines: self.bus_lines,
                world_id: self.info_world_id,
                comments: self.comments,
                virtual_meeting_link: self.virtual_meeting_link,
                phone_meeting_number: self.phone_meeting_number,
                virtual_meeting_additional_info: self.virtual_meeting_additional_info,
            },
            service_body: ServiceBody {
                id: self.service_body_id,
                source_id: self.service_body_source_id,
                root_server_id: self.root_server_id,
                parent_id: self.service_body_parent_id,
                name: self.service_body_name,
                r#type: self.service_body_type,
                description: None,
                url: None,
                helpline: None,
                world_id: self.service_body_world_id,
                num_meetings: 0,
                num_groups: 0,
            },
            root_server: RootServer {
                id: self.root_server_id,
                source_id: 0,
                url: self.root_server_url,
                name: None,
                server_info: None,
                last_successful_import: None,
                num_areas: 0,
                num_regions: 0,
                num_zones: 0,
                num_meetings: 0,
                num_groups: 0,
            },
            formats,
            distance_km: self.distance_km,
        }
    }
}

/// Allow-list mapping external meeting keys to SQL columns, for
/// `meeting_key` exact match and `sort_keys`. Many-to-many keys (`formats`,
/// `format_shared_id_list`) resolve to `None` and are silently ignored by
/// the sort path.
fn resolve_column(key: &str) -> Option<&'static str> {
    Some(match key {
        "id_bigint" => "m.id",
        "worldid_mixed" => "mi.world_id",
        "service_body_bigint" => "m.service_body_id",
        "weekday_tinyint" => "m.weekday",
        "venue_type" => "m.venue_type",
        "start_time" => "m.start_time",
        "duration_time" => "m.duration_minutes",
        "lang_enum" => "m.language",
        "longitude" => "m.longitude",
        "latitude" => "m.latitude",
        "email_contact" => "mi.email",
        "meeting_name" => "m.name",
        "location_text" => "mi.location_text",
        "location_info" => "mi.location_info",
        "location_street" => "mi.location_street",
        "location_city_subsection" => "mi.location_city_subsection",
        "location_neighborhood" => "mi.location_neighborhood",
        "location_municipality" => "mi.location_municipality",
        "location_sub_province" => "mi.location_sub_province",
        "location_province" => "mi.location_province",
        "location_postal_code_1" => "mi.location_postal_code_1",
        "location_nation" => "mi.location_nation",
        "comments" => "mi.comments",
        "train_lines" => "mi.train_lines",
        "bus_lines" => "mi.bus_lines",
        "root_server_id" => "m.root_server_id",
        _ => return None,
    })
}

/// The select list and joins every meeting listing query shares; callers
/// append their own `WHERE`/`ORDER BY`/`LIMIT` afterward.
fn push_select_and_joins(qb: &mut QueryBuilder<Postgres>, geo: Option<&crate::query::geospatial::GeoQuery>) {
    qb.push(
        r#"
        SELECT m.id, m.source_id, m.root_server_id, rs.url AS root_server_url,
               m.service_body_id, sb.source_id AS service_body_source_id,
               sb.name AS service_body_name, sb.type AS service_body_type,
               sb.parent_id AS service_body_parent_id, sb.world_id AS service_body_world_id,
               m.name, m.weekday, m.venue_type, m.start_time, m.duration_minutes, m.language,
               m.latitude::double precision AS latitude, m.longitude::double precision AS longitude,
               m.published, m.deleted,
               mi.email, mi.location_text, mi.location_info, mi.location_street,
               mi.location_city_subsection, mi.location_neighborhood, mi.location_municipality,
               mi.location_sub_province, mi.location_province, mi.location_postal_code_1,
               mi.location_nation, mi.train_lines, mi.bus_lines, mi.world_id AS info_world_id,
               mi.comments, mi.virtual_meeting_link, mi.phone_meeting_number,
               mi.virtual_meeting_additional_info,
               (SELECT array_agg(f.id ORDER BY f.id)
                FROM meeting_formats mf JOIN formats f ON f.id = mf.format_id
                WHERE mf.meeting_id = m.id) AS format_ids,
               (SELECT array_agg(coalesce(f.world_id, '') ORDER BY f.id)
                FROM meeting_formats mf JOIN formats f ON f.id = mf.format_id
                WHERE mf.meeting_id = m.id) AS format_world_ids
        "#,
    );

    if let Some(geo) = geo {
        qb.push(", ");
        qb.push(haversine_km_expr(geo.latitude, geo.longitude));
        qb.push(" AS distance_km");
    } else {
        qb.push(", NULL::double precision AS distance_km");
    }

    qb.push(" FROM meetings m JOIN service_bodies sb ON sb.id = m.service_body_id JOIN root_servers rs ON rs.id = m.root_server_id");
    qb.push(" LEFT JOIN meeting_info mi ON mi.meeting_id = m.id");
}

/// Runs a filter plan against the store. Returns an empty result
/// immediately, with no query issued, when the required-filter rule is
/// unmet.
pub async fn search(pool: &PgPool, plan: &FilterPlan) -> Result<Vec<MeetingSearchRow>, sqlx::Error> {
    if !plan.satisfies_required_filter_rule() {
        return Ok(Vec::new());
    }
    build_search_query(plan).build_query_as::<MeetingSearchRow>().fetch_all(pool).await
}

/// The streaming variant: rows arrive over a bounded channel as the cursor
/// produces them, so a renderer never holds the full result set. Dropping
/// the receiver (client disconnect) stops the producer task and releases
/// the cursor on its next send.
pub fn search_stream(
    pool: PgPool,
    plan: FilterPlan,
) -> futures::channel::mpsc::Receiver<Result<MeetingSearchRow, sqlx::Error>> {
    use futures::{SinkExt, StreamExt};

    let (mut tx, rx) = futures::channel::mpsc::channel(64);
    tokio::spawn(async move {
        if !plan.satisfies_required_filter_rule() {
            return;
        }
        let mut qb = build_search_query(&plan);
        let query = qb.build_query_as::<MeetingSearchRow>();
        let mut rows = query.fetch(&pool);
        while let Some(row) = rows.next().await {
            let failed = row.is_err();
            if tx.send(row).await.is_err() || failed {
                break;
            }
        }
    });
    rx
}

fn build_search_query(plan: &FilterPlan) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");
    push_select_and_joins(&mut qb, plan.geo.as_ref());
    qb.push(" WHERE m.published = TRUE AND m.deleted = FALSE");

    if !plan.meeting_ids.is_empty() {
        qb.push(" AND m.id = ANY(");
        qb.push_bind(plan.meeting_ids.clone());
        qb.push(")");
    }

    push_signed_filter(&mut qb, "m.weekday", &plan.weekdays_include, &plan.weekdays_exclude);
    push_signed_filter(&mut qb, "m.root_server_id", &plan.roots_include, &plan.roots_exclude);

    if plan.recursive {
        push_recursive_service_filter(&mut qb, &plan.services_include, &plan.services_exclude);
    } else {
        push_signed_filter(&mut qb, "m.service_body_id", &plan.services_include, &plan.services_exclude);
    }

    if !plan.venue_types_include.is_empty() {
        qb.push(" AND m.venue_type = ANY(");
        qb.push_bind(plan.venue_types_include.clone());
        qb.push(")");
    }
    if !plan.venue_types_exclude.is_empty() {
        qb.push(" AND NOT (m.venue_type = ANY(");
        qb.push_bind(plan.venue_types_exclude.clone());
        qb.push("))");
    }

    if !plan.formats_include.is_empty() {
        match plan.formats_op {
            Some(FormatsOp::And) => {
                qb.push(" AND (SELECT count(*) FROM meeting_formats mf WHERE mf.meeting_id = m.id AND mf.format_id = ANY(");
                qb.push_bind(plan.formats_include.clone());
                qb.push(")) = ");
                qb.push_bind(plan.formats_include.len() as i64);
            }
            _ => {
                qb.push(" AND EXISTS (SELECT 1 FROM meeting_formats mf WHERE mf.meeting_id = m.id AND mf.format_id = ANY(");
                qb.push_bind(plan.formats_include.clone());
                qb.push("))");
            }
        }
    }
    if !plan.formats_exclude.is_empty() {
        qb.push(" AND NOT EXISTS (SELECT 1 FROM meeting_formats mf WHERE mf.meeting_id = m.id AND mf.format_id = ANY(");
        qb.push_bind(plan.formats_exclude.clone());
        qb.push("))");
    }

    if let Some((key, value)) = &plan.meeting_key {
        if let Some(column) = resolve_column(key) {
            qb.push(format!(" AND {column}::text = "));
            qb.push_bind(value.clone());
        }
    }

    if let Some(t) = plan.starts_after {
        qb.push(" AND m.start_time >= ");
        qb.push_bind(t);
    }
    if let Some(t) = plan.starts_before {
        qb.push(" AND m.start_time <= ");
        qb.push_bind(t);
    }
    if let Some(t) = plan.ends_before {
        qb.push(" AND (m.start_time + make_interval(mins => coalesce(m.duration_minutes, 0))) <= ");
        qb.push_bind(t);
    }
    if let Some(min) = plan.min_duration_minutes {
        qb.push(" AND m.duration_minutes >= ");
        qb.push_bind(min);
    }
    if let Some(max) = plan.max_duration_minutes {
        qb.push(" AND m.duration_minutes <= ");
        qb.push_bind(max);
    }

    if let Some(geo) = &plan.geo {
        if let GeoMode::RadiusKm(radius) = geo.mode {
            if radius > 0.0 {
                qb.push(" AND ");
                qb.push(haversine_km_expr(geo.latitude, geo.longitude));
                qb.push(" <= ");
                qb.push_bind(radius);
            }
        }
    }

    if let Some(text) = &plan.text {
        if let Some(substring) = &text.exact_substring {
            qb.push(
                " AND concat_ws(' ', m.name, mi.location_text, mi.location_info, mi.location_street, \
                 mi.location_city_subsection, mi.location_neighborhood, mi.location_municipality, \
                 mi.location_sub_province, mi.location_province, mi.location_postal_code_1, \
                 mi.location_nation, mi.comments) ILIKE ",
            );
            qb.push_bind(format!("%{substring}%"));
        } else if text.tsquery.is_some() || !text.meeting_id_disjuncts.is_empty() {
            qb.push(" AND (");
            let mut first = true;
            if let Some(tsquery) = &text.tsquery {
                qb.push("m.search_vector @@ to_tsquery('simple', ");
                qb.push_bind(tsquery.clone());
                qb.push(")");
                first = false;
            }
            if !text.meeting_id_disjuncts.is_empty() {
                if !first {
                    qb.push(" OR ");
                }
                qb.push("m.id = ANY(");
                qb.push_bind(text.meeting_id_disjuncts.clone());
                qb.push(")");
            }
            qb.push(")");
        }
    }

    // Nearest-N must rank by distance regardless of the sort flag; a bare
    // LIMIT without that ordering would pick an arbitrary N.
    let nearest_n = matches!(plan.geo.as_ref().map(|g| g.mode), Some(GeoMode::NearestN(_)));
    let order_columns: Vec<String> = if (plan.sort_by_distance || nearest_n) && plan.geo.is_some() {
        vec!["distance_km ASC".to_string()]
    } else if !plan.sort_keys.is_empty() {
        plan.sort_keys
            .iter()
            .filter_map(|k| resolve_column(k))
            .map(|c| format!("{c} ASC NULLS FIRST"))
            .collect()
    } else {
        Vec::new()
    };
    let order_columns = if order_columns.is_empty() {
        vec![
            "m.language ASC NULLS FIRST".to_string(),
            "m.weekday ASC".to_string(),
            "m.start_time ASC NULLS FIRST".to_string(),
            "m.id ASC".to_string(),
        ]
    } else {
        order_columns
    };
    qb.push(format!(" ORDER BY {}", order_columns.join(", ")));

    if let Some(GeoMode::NearestN(n)) = plan.geo.as_ref().map(|g| g.mode) {
        qb.push(" LIMIT ");
        qb.push_bind(n as i64);
    } else if plan.page_size > 0 {
        qb.push(" LIMIT ");
        qb.push_bind(plan.page_size);
        qb.push(" OFFSET ");
        qb.push_bind((plan.page_num - 1) * plan.page_size);
    }

    qb
}

/// `GetFieldValues` — every published meeting, optionally scoped to a
/// set of root servers, with no other filtering. This bypasses the
/// required-filter rule deliberately: it backs a catalog-wide distinct-value
/// report rather than the general search surface.
pub async fn list_for_field_values(pool: &PgPool, root_server_ids: &[i64]) -> Result<Vec<MeetingSearchRow>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");
    push_select_and_joins(&mut qb, None);
    qb.push(" WHERE m.published = TRUE AND m.deleted = FALSE");
    if !root_server_ids.is_empty() {
        qb.push(" AND m.root_server_id = ANY(");
        qb.push_bind(root_server_ids.to_vec());
        qb.push(")");
    }
    qb.push(" ORDER BY m.id");
    qb.build_query_as::<MeetingSearchRow>().fetch_all(pool).await
}

/// `GetNAWSDump` — every meeting (including unpublished/deleted) under
/// the given service bodies with a non-empty `world_id`.
pub async fn list_for_naws_dump(pool: &PgPool, service_body_ids: &[i64]) -> Result<Vec<MeetingSearchRow>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");
    push_select_and_joins(&mut qb, None);
    qb.push(" WHERE m.service_body_id = ANY(");
    qb.push_bind(service_body_ids.to_vec());
    qb.push(") AND mi.world_id IS NOT NULL AND mi.world_id <> ''");
    qb.push(" ORDER BY m.id");
    qb.build_query_as::<MeetingSearchRow>().fetch_all(pool).await
}

fn push_signed_filter(qb: &mut QueryBuilder<Postgres>, column: &str, include: &[i64], exclude: &[i64]) {
    if !include.is_empty() {
        qb.push(format!(" AND {column} = ANY("));
        qb.push_bind(include.to_vec());
        qb.push(")");
    }
    if !exclude.is_empty() {
        qb.push(format!(" AND NOT ({column} = ANY("));
        qb.push_bind(exclude.to_vec());
        qb.push("))");
    }
}

/// Expands `services[]` to every descendant via a recursive CTE over
/// `parent_id`, then filters as usual.
fn push_recursive_service_filter(qb: &mut QueryBuilder<Postgres>, include: &[i64], exclude: &[i64]) {
    if !include.is_empty() {
        qb.push(" AND m.service_body_id IN (WITH RECURSIVE descendants AS (SELECT id FROM service_bodies WHERE id = ANY(");
        qb.push_bind(include.to_vec());
        qb.push(") UNION ALL SELECT sb.id FROM service_bodies sb JOIN descendants d ON sb.parent_id = d.id) SELECT id FROM descendants)");
    }
    if !exclude.is_empty() {
        qb.push(" AND m.service_body_id NOT IN (WITH RECURSIVE descendants AS (SELECT id FROM service_bodies WHERE id = ANY(");
        qb.push_bind(exclude.to_vec());
        qb.push(") UNION ALL SELECT sb.id FROM service_bodies sb JOIN descendants d ON sb.parent_id = d.id) SELECT id FROM descendants)");
    }
}
