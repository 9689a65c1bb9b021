use crate::{
    error::TransformError,
    transform::{Transform, index::LookupIndex, template::KeyTemplate},
};
use engine_config::mapping::{EntityMapping, GroupConfig};
use model::{
    core::value::{AttributeMap, Value},
    records::{
        item::Item,
        row::{Row, RowsByTable},
    },
};

const RESERVED: [&str; 3] = ["PK", "SK", "EntityType"];

struct CompiledEntity {
    mapping: EntityMapping,
    pk: KeyTemplate,
    sk: KeyTemplate,
    attributes: Vec<(String, KeyTemplate)>,
}

/// Data-driven transform built from a group's entity mappings.
///
/// Each entity row yields exactly one item: the row's columns, then lookups in
/// declaration order (so a lookup may read an attribute an earlier one set),
/// then embeds, then templated attributes and keys.
pub struct TemplateTransform {
    entities: Vec<CompiledEntity>,
}

impl TemplateTransform {
    pub fn new(group: &GroupConfig) -> Result<Self, TransformError> {
        let entities = group
            .entities
            .iter()
            .map(|mapping| {
                Ok(CompiledEntity {
                    pk: KeyTemplate::parse(&mapping.pk)?,
                    sk: KeyTemplate::parse(&mapping.sk)?,
                    attributes: mapping
                        .attributes
                        .iter()
                        .map(|(name, t)| Ok((name.clone(), KeyTemplate::parse(t)?)))
                        .collect::<Result<_, TransformError>>()?,
                    mapping: mapping.clone(),
                })
            })
            .collect::<Result<_, TransformError>>()?;

        Ok(TemplateTransform { entities })
    }

    fn index_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entities.iter().flat_map(|e| {
            let lookups = e
                .mapping
                .lookups
                .iter()
                .map(|l| (l.table.as_str(), l.key.as_str()));
            let embeds = e
                .mapping
                .embeds
                .iter()
                .map(|m| (m.table.as_str(), m.foreign_key.as_str()));
            lookups.chain(embeds)
        })
    }

    fn transform_row(
        &self,
        entity: &CompiledEntity,
        row: &Row,
        index: &LookupIndex<'_>,
    ) -> Result<Item, TransformError> {
        let mut attrs = row.values.clone();

        for lookup in &entity.mapping.lookups {
            let found = attrs
                .get(&lookup.from)
                .and_then(|key| index.first(&lookup.table, &lookup.key, key))
                .map(|hit| hit.get_value(&lookup.field))
                .filter(|v| !v.is_null())
                .or_else(|| lookup.default.clone());
            if let Some(value) = found {
                attrs.insert(lookup.name.clone(), value);
            }
        }

        for embed in &entity.mapping.embeds {
            let children: Vec<Value> = attrs
                .get(&embed.local_key)
                .map(|key| index.all(&embed.table, &embed.foreign_key, key))
                .unwrap_or_default()
                .iter()
                .map(|child| Value::Map(select(child, &embed.fields)))
                .collect();
            if let Some(count) = &embed.count_attribute {
                attrs.insert(count.clone(), Value::Int(children.len() as i64));
            }
            attrs.insert(embed.name.clone(), Value::List(children));
        }

        let key = |template: &KeyTemplate| {
            template
                .render(&attrs)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| TransformError::MissingKey {
                    entity: entity.mapping.entity_type.clone(),
                    template: template.as_str().to_string(),
                })
        };
        let pk = key(&entity.pk)?;
        let sk = key(&entity.sk)?;

        let rendered: Vec<(String, String)> = entity
            .attributes
            .iter()
            .filter_map(|(name, template)| Some((name.clone(), template.render(&attrs)?)))
            .collect();
        for (name, value) in rendered {
            attrs.insert(name, Value::String(value));
        }
        for reserved in RESERVED {
            attrs.remove(reserved);
        }

        Ok(Item {
            pk,
            sk,
            entity_type: entity.mapping.entity_type.clone(),
            attributes: attrs,
        })
    }
}

fn select(row: &Row, fields: &[String]) -> AttributeMap {
    if fields.is_empty() {
        return row.values.clone();
    }
    fields
        .iter()
        .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

impl Transform for TemplateTransform {
    fn apply(&self, rows: &RowsByTable) -> Result<Vec<Item>, TransformError> {
        let index = LookupIndex::build(rows, self.index_keys());

        let mut items = Vec::new();
        for entity in &self.entities {
            let source = rows
                .get(&entity.mapping.table)
                .ok_or_else(|| TransformError::MissingTable(entity.mapping.table.clone()))?;
            for row in source {
                items.push(self.transform_row(entity, row, &index)?);
            }
        }
        Ok(items)
    }
}
