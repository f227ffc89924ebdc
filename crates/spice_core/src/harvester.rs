//! Harvester lifecycle: prospect, harvest, return to a refinery, deploy.
//!
//! The state machine runs once per tick per harvester. Spice amounts are
//! fixed-point; a harvester never holds more than its capacity.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, Health, ObjectKind};
use crate::context::SimContext;
use crate::ground_unit;
use crate::map::MapOracle;
use crate::math::{fixed_serde, Coord, Fixed};
use crate::reference::ObjectRef;
use crate::registry::ObjectRegistry;
use crate::service;

/// Extraction speed is split into this many health bands.
const HEALTH_BANDS: u32 = 5;

/// Where a harvester is in its work cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HarvesterState {
    /// Nothing to do.
    #[default]
    Idle,
    /// Looking for a spice site in the assigned zone.
    Prospecting,
    /// Driving to a spice tile.
    TravelingToSite(Coord),
    /// Loading spice from a tile.
    Harvesting(Coord),
    /// Heading to a booked refinery.
    ReturningToRefinery,
    /// Inside a refinery, being emptied.
    AwaitingDeployDecision,
}

/// How the next spice site is picked from the prospection samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Richest site first.
    #[default]
    BestDensity,
    /// Closest site first.
    BestDistance,
}

/// Spice density recorded for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectionSample {
    /// Sampled tile.
    pub site: Coord,
    /// Spice found there.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
}

/// Prospection samples, at most one per site, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProspectionSamples {
    samples: Vec<ProspectionSample>,
}

impl ProspectionSamples {
    /// Record a sample. A newer sample for a known site replaces the old
    /// value in place.
    pub fn add(&mut self, site: Coord, speed: Fixed) {
        match self.samples.iter_mut().find(|s| s.site == site) {
            Some(existing) => existing.speed = speed,
            None => self.samples.push(ProspectionSample { site, speed }),
        }
    }

    /// Forget a site.
    pub fn remove(&mut self, site: Coord) {
        self.samples.retain(|s| s.site != site);
    }

    /// Sample recorded for `site`.
    #[must_use]
    pub fn get(&self, site: Coord) -> Option<&ProspectionSample> {
        self.samples.iter().find(|s| s.site == site)
    }

    /// Number of sampled sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate samples in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &ProspectionSample> {
        self.samples.iter()
    }

    /// Pick a site. Only strictly better candidates replace the current
    /// pick, so ties go to the first sample.
    #[must_use]
    pub fn select(&self, policy: SelectionPolicy, from: Coord) -> Option<Coord> {
        let mut best: Option<&ProspectionSample> = None;
        for sample in self.samples.iter().filter(|s| s.speed > Fixed::ZERO) {
            let better = match (policy, best) {
                (_, None) => true,
                (SelectionPolicy::BestDensity, Some(current)) => sample.speed > current.speed,
                (SelectionPolicy::BestDistance, Some(current)) => {
                    sample.site.block_distance(from) < current.site.block_distance(from)
                }
            };
            if better {
                best = Some(sample);
            }
        }
        best.map(|s| s.site)
    }
}

/// Harvesting state of a harvester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvester {
    #[serde(with = "fixed_serde")]
    spice: Fixed,
    #[serde(with = "fixed_serde")]
    capacity: Fixed,
    state: HarvesterState,
    samples: ProspectionSamples,
    policy: SelectionPolicy,
    zone: Option<Coord>,
    refinery: ObjectRef,
}

impl Harvester {
    /// Empty harvester.
    #[must_use]
    pub fn new(capacity: Fixed) -> Self {
        Self {
            spice: Fixed::ZERO,
            capacity,
            state: HarvesterState::Idle,
            samples: ProspectionSamples::default(),
            policy: SelectionPolicy::default(),
            zone: None,
            refinery: ObjectRef::NONE,
        }
    }

    /// Spice on board.
    #[must_use]
    pub const fn spice(&self) -> Fixed {
        self.spice
    }

    /// Maximum load.
    #[must_use]
    pub const fn capacity(&self) -> Fixed {
        self.capacity
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HarvesterState {
        self.state
    }

    /// Centre of the assigned harvesting zone.
    #[must_use]
    pub const fn zone(&self) -> Option<Coord> {
        self.zone
    }

    /// Refinery booked for the current return trip.
    #[must_use]
    pub const fn refinery(&self) -> ObjectRef {
        self.refinery
    }

    /// Site selection policy.
    #[must_use]
    pub const fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Change the site selection policy.
    pub fn set_policy(&mut self, policy: SelectionPolicy) {
        self.policy = policy;
    }

    /// Recorded prospection samples.
    #[must_use]
    pub const fn samples(&self) -> &ProspectionSamples {
        &self.samples
    }

    /// Whether the load reached capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.spice >= self.capacity
    }

    /// Whether the harvester is on its way to or working a spice tile.
    #[must_use]
    pub const fn is_harvesting_mode(&self) -> bool {
        matches!(
            self.state,
            HarvesterState::TravelingToSite(_) | HarvesterState::Harvesting(_)
        )
    }

    /// Whether the harvester is heading back to unload.
    #[must_use]
    pub const fn is_returning_to_refinery(&self) -> bool {
        matches!(self.state, HarvesterState::ReturningToRefinery)
    }

    /// Load spice, bounded by capacity. Returns what was loaded.
    pub fn load(&mut self, amount: Fixed) -> Fixed {
        let loaded = amount.min(self.capacity - self.spice).max(Fixed::ZERO);
        self.spice += loaded;
        loaded
    }

    /// Remove up to `rate` spice for refining. Returns what was removed.
    pub fn extract_spice(&mut self, rate: Fixed) -> Fixed {
        let taken = rate.min(self.spice).max(Fixed::ZERO);
        self.spice -= taken;
        taken
    }

    /// Record a prospection sample (last write wins).
    pub fn add_prospection_sample(&mut self, site: Coord, speed: Fixed) {
        self.samples.add(site, speed);
    }

    /// Refresh samples: drop depleted sites, then sample every spice tile
    /// in the square zone around `center`.
    pub fn prospect(&mut self, map: &dyn MapOracle, center: Coord, radius: i32) {
        self.samples.samples.retain(|s| map.spice_at(s.site) > Fixed::ZERO);

        for y in (center.y - radius)..=(center.y + radius) {
            for x in (center.x - radius)..=(center.x + radius) {
                let site = Coord::new(x, y);
                let spice = map.spice_at(site);
                if spice > Fixed::ZERO {
                    self.samples.add(site, spice);
                }
            }
        }
    }

    /// Pick the next spice site with the current policy.
    #[must_use]
    pub fn select_site(&self, from: Coord) -> Option<Coord> {
        self.samples.select(self.policy, from)
    }

    pub(crate) fn on_deployed(&mut self) {
        self.state = HarvesterState::Idle;
        self.refinery.clear();
    }

    pub(crate) fn on_entered_refinery(&mut self) {
        self.state = HarvesterState::AwaitingDeployDecision;
        self.refinery.clear();
    }
}

/// Health band used to scale refinery throughput, between 1 and 5.
#[must_use]
pub fn extraction_scale(health: &Health) -> u32 {
    if health.max == 0 {
        return 1;
    }
    let band = u64::from(HEALTH_BANDS) * u64::from(health.current) / u64::from(health.max);
    u32::try_from(band).unwrap_or(HEALTH_BANDS).clamp(1, HEALTH_BANDS)
}

/// Spice a refinery extracts per tick: damaged refineries work slower,
/// but never below a fifth of `base`.
#[must_use]
pub fn extraction_rate(base: Fixed, health: &Health) -> Fixed {
    base * Fixed::from_num(extraction_scale(health)) / Fixed::from_num(HEALTH_BANDS)
}

/// Give a harvester a zone to work. Returns `false` for non-harvesters.
pub fn order_harvest(registry: &mut ObjectRegistry, id: EntityId, zone: Coord) -> bool {
    let Some(harvester) = registry.get_mut(id).and_then(|o| o.harvester.as_mut()) else {
        return false;
    };
    harvester.zone = Some(zone);
    if matches!(
        harvester.state,
        HarvesterState::Idle
            | HarvesterState::Prospecting
            | HarvesterState::TravelingToSite(_)
            | HarvesterState::Harvesting(_)
    ) {
        harvester.state = HarvesterState::Prospecting;
    }
    tracing::debug!(harvester = id, ?zone, "Harvest zone assigned");
    true
}

/// Abandon a return trip, giving the booking back to the refinery.
pub fn cancel_refinery_trip(registry: &mut ObjectRegistry, id: EntityId) {
    let Some(harvester) = registry.get(id).and_then(|o| o.harvester.as_ref()) else {
        return;
    };
    if !harvester.is_returning_to_refinery() {
        return;
    }
    if let Some(refinery) = harvester.refinery.live_id(registry) {
        if let Some(slot) = registry.get_mut(refinery).and_then(|r| r.service.as_mut()) {
            slot.remove_booking();
        }
    }
    if let Some(harvester) = registry.get_mut(id).and_then(|o| o.harvester.as_mut()) {
        harvester.refinery.clear();
        harvester.state = HarvesterState::Idle;
    }
}

/// Per-tick harvester behaviour.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(object) = ctx.registry.get(id) else {
        return;
    };
    let Some(harvester) = object.harvester.as_ref() else {
        return;
    };
    if !object.is_on_map() {
        return;
    }
    if object
        .ground
        .is_some_and(|g| g.is_awaiting_pickup() || g.repair_yard().is_set())
    {
        return;
    }

    let location = object.location;
    let moving = object.is_moving();
    let state = harvester.state;
    let full = harvester.is_full();
    let has_zone = harvester.zone.is_some();

    match state {
        HarvesterState::Idle => {
            if full {
                begin_return(ctx, id);
            } else if has_zone {
                set_state(ctx.registry, id, HarvesterState::Prospecting);
            }
        }
        HarvesterState::Prospecting => prospect_and_travel(ctx, id, location),
        HarvesterState::TravelingToSite(site) => {
            if location == site {
                let next = if ctx.map.spice_at(site) > Fixed::ZERO {
                    HarvesterState::Harvesting(site)
                } else {
                    HarvesterState::Prospecting
                };
                set_state(ctx.registry, id, next);
            } else if !moving {
                if let Some(object) = ctx.registry.get_mut(id) {
                    object.set_destination(site);
                }
            }
        }
        HarvesterState::Harvesting(site) => harvest(ctx, id, site, location),
        HarvesterState::ReturningToRefinery => continue_return(ctx, id, location, moving),
        HarvesterState::AwaitingDeployDecision => {}
    }
}

fn set_state(registry: &mut ObjectRegistry, id: EntityId, state: HarvesterState) {
    if let Some(harvester) = registry.get_mut(id).and_then(|o| o.harvester.as_mut()) {
        harvester.state = state;
    }
}

fn travel_to_site(registry: &mut ObjectRegistry, id: EntityId, site: Coord) {
    if let Some(object) = registry.get_mut(id) {
        object.guard_point = site;
        object.set_destination(site);
        if let Some(harvester) = object.harvester.as_mut() {
            harvester.state = HarvesterState::TravelingToSite(site);
        }
    }
}

fn prospect_and_travel(ctx: &mut SimContext<'_>, id: EntityId, location: Coord) {
    let radius = ctx.rules.prospect_radius;
    let Some(harvester) = ctx.registry.get_mut(id).and_then(|o| o.harvester.as_mut()) else {
        return;
    };
    let center = harvester.zone.unwrap_or(location);
    harvester.prospect(&*ctx.map, center, radius);
    let site = harvester.select_site(location);
    let carrying = harvester.spice > Fixed::ZERO;

    match site {
        Some(site) => {
            tracing::debug!(harvester = id, ?site, "Spice site selected");
            travel_to_site(ctx.registry, id, site);
        }
        None if carrying => begin_return(ctx, id),
        None => {
            tracing::info!(harvester = id, ?center, "Spice famine, harvester idle");
            harvester.zone = None;
            harvester.state = HarvesterState::Idle;
        }
    }
}

fn harvest(ctx: &mut SimContext<'_>, id: EntityId, site: Coord, location: Coord) {
    if location != site {
        travel_to_site(ctx.registry, id, site);
        return;
    }

    let rate = ctx.rules.harvest_rate;
    let Some(harvester) = ctx.registry.get_mut(id).and_then(|o| o.harvester.as_mut()) else {
        return;
    };
    let wanted = rate.min(harvester.capacity - harvester.spice);
    let taken = ctx.map.take_spice(site, wanted);
    harvester.load(taken);

    if harvester.is_full() {
        begin_return(ctx, id);
        return;
    }
    if ctx.map.spice_at(site) > Fixed::ZERO {
        return;
    }

    harvester.samples.remove(site);
    let carrying = harvester.spice > Fixed::ZERO;
    match richest_neighbour(&*ctx.map, site) {
        Some(next) => travel_to_site(ctx.registry, id, next),
        None if carrying => begin_return(ctx, id),
        None => set_state(ctx.registry, id, HarvesterState::Prospecting),
    }
}

fn richest_neighbour(map: &dyn MapOracle, site: Coord) -> Option<Coord> {
    let mut best: Option<(Coord, Fixed)> = None;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let tile = Coord::new(site.x + dx, site.y + dy);
            let spice = map.spice_at(tile);
            if spice > Fixed::ZERO && best.map_or(true, |(_, s)| spice > s) {
                best = Some((tile, spice));
            }
        }
    }
    best.map(|(tile, _)| tile)
}

fn begin_return(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(object) = ctx.registry.get(id) else {
        return;
    };
    let (owner, location) = (object.owner, object.location);

    if ctx.houses.get(owner).is_some_and(|h| h.is_storage_full()) {
        tracing::trace!(harvester = id, "Storage full, harvester waiting");
        if let Some(object) = ctx.registry.get_mut(id) {
            object.clear_path();
            if let Some(harvester) = object.harvester.as_mut() {
                harvester.state = HarvesterState::Idle;
            }
        }
        return;
    }

    let Some(refinery) =
        service::least_booked_provider(ctx.registry, owner, ObjectKind::Refinery, location)
    else {
        tracing::trace!(harvester = id, "No refinery to return to");
        set_state(ctx.registry, id, HarvesterState::Idle);
        return;
    };

    let Some(target) = ctx.registry.get_mut(refinery).map(|r| {
        if let Some(slot) = r.service.as_mut() {
            slot.add_booking();
        }
        r.closest_tile(location)
    }) else {
        return;
    };
    if let Some(harvester) = ctx.registry.get_mut(id).and_then(|o| o.harvester.as_mut()) {
        harvester.refinery = ObjectRef::to(refinery);
        harvester.state = HarvesterState::ReturningToRefinery;
    }
    tracing::debug!(harvester = id, refinery, "Returning to refinery");

    if !ground_unit::request_carryall_drop(ctx, id, target) {
        if let Some(object) = ctx.registry.get_mut(id) {
            object.set_destination(target);
        }
    }
}

fn continue_return(ctx: &mut SimContext<'_>, id: EntityId, location: Coord, moving: bool) {
    let Some((refinery_ref, owner)) = ctx
        .registry
        .get(id)
        .and_then(|o| o.harvester.as_ref().map(|h| (h.refinery, o.owner)))
    else {
        return;
    };

    let Some(refinery) = refinery_ref.resolve(ctx.registry) else {
        tracing::debug!(harvester = id, "Refinery lost, choosing another");
        if let Some(harvester) = ctx.registry.get_mut(id).and_then(|o| o.harvester.as_mut()) {
            harvester.refinery.clear();
        }
        begin_return(ctx, id);
        return;
    };
    let refinery_id = refinery.id;
    let adjacent = refinery.is_adjacent(location);
    let target = refinery.closest_tile(location);

    if ctx.houses.get(owner).is_some_and(|h| h.is_storage_full()) {
        if let Some(object) = ctx.registry.get_mut(id) {
            object.clear_path();
        }
        return;
    }

    if adjacent {
        if let Err(error) = service::assign_occupant(ctx, refinery_id, id) {
            tracing::trace!(harvester = id, %error, "Waiting for refinery");
            if let Some(object) = ctx.registry.get_mut(id) {
                object.clear_path();
            }
        }
    } else if !moving && !ground_unit::request_carryall_drop(ctx, id, target) {
        if let Some(object) = ctx.registry.get_mut(id) {
            object.set_destination(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::TileMap;
    use proptest::prelude::*;

    fn fx(v: f64) -> Fixed {
        Fixed::from_num(v)
    }

    #[test]
    fn test_extraction_scale_bands() {
        let cases = [(100, 5), (50, 2), (21, 1), (19, 1)];
        for (current, scale) in cases {
            let health = Health { current, max: 100 };
            assert_eq!(extraction_scale(&health), scale, "health {current}");
        }
    }

    #[test]
    fn test_extraction_rate_follows_scale() {
        let base = fx(0.625);
        let rate = |current| extraction_rate(base, &Health { current, max: 100 });

        assert_eq!(rate(100), fx(0.625));
        assert_eq!(rate(50), fx(0.25));
        assert_eq!(rate(21), fx(0.125));
        assert_eq!(rate(19), fx(0.125));
    }

    #[test]
    fn test_extract_spice_is_bounded() {
        let mut harvester = Harvester::new(fx(700.0));
        harvester.load(fx(1.0));

        assert_eq!(harvester.extract_spice(fx(0.625)), fx(0.625));
        assert_eq!(harvester.extract_spice(fx(0.625)), fx(0.375));
        assert_eq!(harvester.extract_spice(fx(0.625)), Fixed::ZERO);
        assert_eq!(harvester.spice(), Fixed::ZERO);
    }

    #[test]
    fn test_load_stops_at_capacity() {
        let mut harvester = Harvester::new(fx(10.0));
        assert_eq!(harvester.load(fx(8.0)), fx(8.0));
        assert_eq!(harvester.load(fx(8.0)), fx(2.0));
        assert!(harvester.is_full());
    }

    #[test]
    fn test_sample_overwrites_in_place() {
        let mut samples = ProspectionSamples::default();
        samples.add(Coord::new(1, 1), fx(3.0));
        samples.add(Coord::new(2, 2), fx(4.0));
        samples.add(Coord::new(1, 1), fx(9.0));

        let sites: Vec<_> = samples.iter().map(|s| (s.site, s.speed)).collect();
        assert_eq!(
            sites,
            vec![(Coord::new(1, 1), fx(9.0)), (Coord::new(2, 2), fx(4.0))]
        );
    }

    #[test]
    fn test_best_density_ties_go_to_first_sample() {
        let mut samples = ProspectionSamples::default();
        samples.add(Coord::new(5, 5), fx(2.0));
        samples.add(Coord::new(1, 1), fx(7.0));
        samples.add(Coord::new(9, 9), fx(7.0));

        assert_eq!(
            samples.select(SelectionPolicy::BestDensity, Coord::new(9, 9)),
            Some(Coord::new(1, 1))
        );
    }

    #[test]
    fn test_best_distance_picks_closest() {
        let mut samples = ProspectionSamples::default();
        samples.add(Coord::new(5, 5), fx(9.0));
        samples.add(Coord::new(1, 0), fx(1.0));
        samples.add(Coord::new(0, 1), fx(1.0));

        assert_eq!(
            samples.select(SelectionPolicy::BestDistance, Coord::new(0, 0)),
            Some(Coord::new(1, 0))
        );
        assert_eq!(ProspectionSamples::default().select(SelectionPolicy::BestDistance, Coord::new(0, 0)), None);
    }

    #[test]
    fn test_prospect_samples_zone_and_drops_depleted() {
        let mut map = TileMap::new(32, 32);
        map.set_spice(Coord::new(10, 10), fx(50.0));
        map.set_spice(Coord::new(12, 9), fx(80.0));
        map.set_spice(Coord::new(30, 30), fx(80.0));

        let mut harvester = Harvester::new(fx(700.0));
        harvester.add_prospection_sample(Coord::new(3, 3), fx(20.0));
        harvester.prospect(&map, Coord::new(10, 10), 3);

        assert_eq!(harvester.samples().len(), 2);
        assert!(harvester.samples().get(Coord::new(3, 3)).is_none());
        assert_eq!(harvester.select_site(Coord::new(10, 10)), Some(Coord::new(12, 9)));
    }

    #[test]
    fn test_travel_states_are_exclusive() {
        let mut harvester = Harvester::new(fx(700.0));
        harvester.state = HarvesterState::Harvesting(Coord::new(1, 1));
        assert!(harvester.is_harvesting_mode());
        assert!(!harvester.is_returning_to_refinery());

        harvester.state = HarvesterState::ReturningToRefinery;
        assert!(!harvester.is_harvesting_mode());
        assert!(harvester.is_returning_to_refinery());
    }

    proptest! {
        #[test]
        fn prop_samples_never_hold_duplicate_sites(
            writes in prop::collection::vec((0i32..6, 0i32..6, 1i64..1000), 1..60)
        ) {
            let mut samples = ProspectionSamples::default();
            for &(x, y, speed) in &writes {
                samples.add(Coord::new(x, y), Fixed::from_num(speed));
            }

            let mut sites: Vec<_> = samples.iter().map(|s| s.site).collect();
            let count = sites.len();
            sites.sort();
            sites.dedup();
            prop_assert_eq!(sites.len(), count);

            for &(x, y, _) in &writes {
                let last = writes
                    .iter()
                    .rev()
                    .find(|&&(lx, ly, _)| lx == x && ly == y)
                    .map(|&(_, _, s)| Fixed::from_num(s));
                prop_assert_eq!(samples.get(Coord::new(x, y)).map(|s| s.speed), last);
            }
        }
    }
}
