use shared::{
    domain::CollectionKind,
    error::{ApiError, ErrorCode},
    protocol::{CarSummary, DriverSummary, ListPage, ManufacturerSummary, PageItems},
};
use storage::{
    CarWithManufacturer, ListSpec, StoredDriver, StoredManufacturer, CAR_LIST, DRIVER_LIST,
    MANUFACTURER_LIST,
};

use crate::{storage_err, ApiContext};

/// Per-collection listing parameters: which SQL window to run and how many
/// records land on a page. The engine below is the only place pagination
/// logic lives; each collection just supplies its strategy.
struct ListStrategy {
    spec: &'static ListSpec,
    page_size: u32,
}

fn strategy_for(kind: CollectionKind) -> ListStrategy {
    match kind {
        CollectionKind::Drivers => ListStrategy {
            spec: &DRIVER_LIST,
            page_size: 10,
        },
        CollectionKind::Cars => ListStrategy {
            spec: &CAR_LIST,
            page_size: 5,
        },
        CollectionKind::Manufacturers => ListStrategy {
            spec: &MANUFACTURER_LIST,
            page_size: 10,
        },
    }
}

/// One page of a collection, filtered by case-insensitive substring match
/// on the collection's searchable field.
///
/// Pages are 1-based. A page past the last one yields an empty items slice
/// rather than an error or a clamp; `total_count` and `page_count` always
/// describe the whole filtered set.
pub async fn list_page(
    ctx: &ApiContext,
    collection: &str,
    query: Option<&str>,
    page: u32,
    page_size: Option<u32>,
) -> Result<ListPage, ApiError> {
    let kind = CollectionKind::parse(collection).ok_or_else(|| {
        ApiError::new(
            ErrorCode::UnknownCollection,
            format!("unknown collection '{collection}'"),
        )
    })?;
    let strategy = strategy_for(kind);
    let page_size = page_size.unwrap_or(strategy.page_size);
    if page == 0 || page_size == 0 {
        return Err(ApiError::new(
            ErrorCode::InvalidPagination,
            "page and page size must be positive",
        ));
    }

    // An empty or whitespace-only query applies no filter.
    let query = query.map(str::trim).filter(|q| !q.is_empty());

    let total_count = ctx
        .storage
        .count_collection(strategy.spec, query)
        .await
        .map_err(storage_err)?;
    let page_count = total_count.div_ceil(u64::from(page_size));
    let offset = u64::from(page - 1) * u64::from(page_size);

    let items = match kind {
        CollectionKind::Drivers => PageItems::Drivers(
            ctx.storage
                .driver_window(query, page_size, offset)
                .await
                .map_err(storage_err)?
                .into_iter()
                .map(driver_summary)
                .collect(),
        ),
        CollectionKind::Cars => PageItems::Cars(
            ctx.storage
                .car_window(query, page_size, offset)
                .await
                .map_err(storage_err)?
                .into_iter()
                .map(car_summary)
                .collect(),
        ),
        CollectionKind::Manufacturers => PageItems::Manufacturers(
            ctx.storage
                .manufacturer_window(query, page_size, offset)
                .await
                .map_err(storage_err)?
                .into_iter()
                .map(manufacturer_summary)
                .collect(),
        ),
    };

    Ok(ListPage {
        items,
        page,
        total_count,
        page_count,
    })
}

pub(crate) fn driver_summary(record: StoredDriver) -> DriverSummary {
    DriverSummary {
        id: record.id,
        username: record.username,
        first_name: record.first_name,
        last_name: record.last_name,
        license_number: record.license_number,
    }
}

pub(crate) fn car_summary(record: CarWithManufacturer) -> CarSummary {
    CarSummary {
        id: record.id,
        model: record.model,
        manufacturer_id: record.manufacturer_id,
        manufacturer_name: record.manufacturer_name,
    }
}

pub(crate) fn manufacturer_summary(record: StoredManufacturer) -> ManufacturerSummary {
    ManufacturerSummary {
        id: record.id,
        name: record.name,
        country: record.country,
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
