/*!

This is the long-form manual for `county_subsidies` and `subsidymap`.

## Input formats

The subsidy table is read with one of the following providers:
* `csv` Comma Separated Values with a header row (default)
* `xlsx` Excel workbook, first worksheet unless `excelWorksheetName` is given

### csv

Columns are found by name in the first row. Other columns (for example the index column
written by dataframe libraries) are ignored.

```text
,year,total_subs_adj,fips
0,2018,12000002.5,6083
1,2019,94000000,6083
```

The key may have lost its leading zero (`6083` is read as `06083`) or be written as a
float (`6083.0`). Amounts may be negative. An empty or non-numeric cell stops the run with
the line number.

### xlsx

The same columns, in a worksheet. Numeric cells are accepted for all the columns.

## County reference

The known counties come from a GeoJSON `FeatureCollection`. The key of a feature is its `id`,
or the property named by `keyProperty`. `Polygon` and `MultiPolygon` geometries are supported.
Features sharing a key are merged.

## Cleaning

1. Repeated (key, year) pairs are reported. With `"duplicatePolicy": "reject"` they stop the run.
2. Counties of the reference that never appear in the table get a zero record for each year of
   the table (`"fillPolicy": "missingKeys"`, the default). With `"missingPairs"`, every missing
   (county, year) pair is filled.
3. The amounts are clamped into `[lowBound, highBound]` for display (default `[0, 50000000]`).
   The legend labels the bin edges. Its ends are the bounds, written `0-` and `50M+`.

Keys of the table that the reference does not know are reported and not drawn.

## Configuration

All the fields are optional. The command line options take precedence.

```json
{
  "inputSettings": {
    "filePath": "subsidies.csv",
    "provider": "csv",
    "yearColumn": "year",
    "amountColumn": "total_subs_adj",
    "fipsColumn": "fips",
    "excelWorksheetName": "Sheet1"
  },
  "geoSettings": { "filePath": "counties.geojson", "keyProperty": "GEOID" },
  "cleaning": {
    "lowBound": 0,
    "highBound": 50000000,
    "fillPolicy": "missingKeys",
    "duplicatePolicy": "keep"
  },
  "renderSettings": {
    "width": 960, "height": 600, "dpi": 96,
    "fps": 10, "framesPerYear": 10, "endPauseFrames": 30,
    "bins": 8, "lowColor": "#f7fcb9", "highColor": "#004529", "noDataColor": "#d9d9d9",
    "staticYear": 2019, "title": "Agricultural subsidies by county"
  },
  "outputSettings": {
    "outputDirectory": "out",
    "staticFileName": "subsidies_{year}.svg",
    "animatedFileName": "subsidies_animated.svg",
    "summaryFileName": "summary.json"
  }
}
```

Relative paths are resolved against the directory of the configuration file.

## Outputs

- the static map of one year (the last year of the table unless `staticYear` or `--year` is given)
- the animated map: one key frame per year every `framesPerYear` frames, colours changing linearly
  between years, the last year held for `endPauseFrames` frames
- the summary of the run in JSON. With `--reference`, it is compared with a reference summary
  and any difference fails the run.

 */
